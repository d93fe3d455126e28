/// All errors that can occur in this crate.
///
/// These are contract violations by the caller. Malformed, missing or tampered session data
/// coming from a client never surfaces as an error; it is treated as a new anonymous session.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The session cache was used after it was disposed.
    #[error("the session cache was used after it was disposed")]
    Disposed,

    /// The periodic task was started after it was disposed.
    #[error("the periodic task was started after it was disposed")]
    TaskDisposed,

    /// A session id was required to be non-empty, but the all-zero id was given.
    #[error("the session id cannot be empty")]
    EmptySessionId,

    /// A periodic schedule was started with an interval of zero.
    #[error("the interval must be greater than zero")]
    InvalidInterval,

    /// The thread of a [`ThreadTimer`](crate::ThreadTimer) could not be spawned.
    #[error("failed to spawn the timer thread: {0}")]
    TimerThread(#[from] std::io::Error),

    /// A cookie or query parameter name was empty or consisted only of whitespace.
    #[error("the name of the session id carrier cannot be blank")]
    InvalidName,

    /// The configuration does not satisfy its invariants.
    #[error("the session configuration is invalid: {0}")]
    InvalidConfiguration(String),

    /// The encryption provider could not seal a session id.
    #[error("failed to encrypt the session id: {0}")]
    Encryption(String),

    /// A value that should have gone into a response header is not a valid header value.
    #[error("invalid response header value: {0}")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),

    /// A session value could not be converted from or into JSON.
    #[error("failed to convert a session value: {0}")]
    Value(#[from] serde_json::Error),
}

mod expect_impl_error {
    trait ExpectImplError: std::error::Error + Send + Sync + 'static {}

    impl ExpectImplError for super::Error {}
}
