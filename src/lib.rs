//! In-process HTTP sessions.
//!
//! This crate keeps session data in the memory of the server process and ties requests to their
//! session through a session id, carried either by a cookie or by a query parameter.
//! Sessions expire when they were not saved for longer than the session timeout. Expired sessions
//! are evicted when they are looked up, and in bulk by a periodic cleaner.
//!
//! # Change tracking
//!
//! Changes are tracked automatically.
//! Whenever a value of a [`Session`] is inserted or removed, the session is marked as changed.
//! [`SessionManager::save`] only stores sessions that changed and are not empty, and only tells the
//! client about session ids it does not know yet.
//!
//! # Security
//!
//! Session ids are 128 random bits. They never travel in plain text: the transport value is the
//! base64 encoded MAC of the encrypted id, followed by the encrypted id.
//! Anything a client sends that does not decode, authenticate or decrypt is silently replaced by
//! a new session id, so a tampered cookie cannot be told apart from a missing one.
//!
//! The keys live in a [`CryptographyConfiguration`]. With random keys, all sessions become
//! unreadable when the process restarts, which is usually acceptable, as the sessions themselves
//! are gone as well.
//!
//! # Example
//!
//! ```
//! use http::header::{COOKIE, SET_COOKIE};
//! use http::{Request, Response};
//! use inproc_session::{Session, SessionConfig, SessionManager};
//!
//! # fn main() -> inproc_session::Result {
//! // Cookie based sessions with random keys, a timeout of 20 minutes
//! // and a cleaner thread that trims the cache every 30 minutes.
//! let manager = SessionManager::new(SessionConfig::default())?;
//!
//! // The first request carries no session cookie, so its session is empty.
//! let (request, ()) = Request::builder().uri("/").body(()).unwrap().into_parts();
//! let mut session: Session = manager.load(&request)?;
//! assert!(session.is_empty());
//!
//! // Saving a changed session stores it and sets the session cookie.
//! session.insert("user", "ferris")?;
//! let (mut response, ()) = Response::new(()).into_parts();
//! manager.save(Some(&session), &request, &mut response)?;
//! let set_cookie = response.headers[SET_COOKIE].to_str().unwrap();
//! let cookie = set_cookie.split(';').next().unwrap();
//!
//! // The next request sends the cookie back and gets its session.
//! let (request, ()) = Request::builder()
//!     .uri("/")
//!     .header(COOKIE, cookie)
//!     .body(())
//!     .unwrap()
//!     .into_parts();
//! let session = manager.load(&request)?;
//! assert_eq!(session.get::<String>("user")?.as_deref(), Some("ferris"));
//! # Ok(()) }
//! ```

#![forbid(unsafe_code)]
#![deny(
    future_incompatible,
    missing_debug_implementations,
    nonstandard_style,
    missing_docs,
    unreachable_pub,
    missing_copy_implementations,
    unused_qualifications
)]

pub use error::Error;
/// A [`std::result::Result`] with [`Error`] and a default return type of ().
pub type Result<T = ()> = std::result::Result<T, Error>;

mod clock;
mod config;
mod crypto;
mod error;
mod identification;
mod periodic;
mod record;
mod session;
mod session_cache;
mod session_manager;
mod transport;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    IdentifyBy, SessionConfig, SessionSettings, DEFAULT_CACHE_TRIM_INTERVAL,
    DEFAULT_SESSION_TIMEOUT,
};
pub use crypto::{
    Blake3HmacProvider, ChaChaEncryptionProvider, CryptographyConfiguration, EncryptionProvider,
    HmacProvider,
};
pub use identification::{
    CookieIdentificationMethod, IdentificationMethod, QueryParameterIdentificationMethod,
    DEFAULT_SESSION_ID_NAME,
};
pub use periodic::{
    CancellationToken, ManualTimer, PeriodicCacheCleaner, PeriodicTask, ThreadTimer, Timer,
    TimerAction,
};
pub use record::SessionRecord;
pub use session::id_factory::{DebugSessionIdFactory, DefaultSessionIdFactory, SessionIdFactory};
pub use session::{Session, SessionId};
pub use session_cache::SessionCache;
pub use session_manager::SessionManager;
pub use transport::{SessionIdentificationData, TransportCodec};
