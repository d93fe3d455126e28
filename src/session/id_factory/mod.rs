use crate::SessionId;
use log::debug;
use parking_lot::Mutex;
use rand::Rng;
use std::fmt::Debug;
use uuid::{Builder, Uuid};

/// A type with the ability to mint and parse session ids.
pub trait SessionIdFactory: Debug + Send + Sync {
    /// Mint a fresh session id, marked as new.
    fn create_new(&self) -> SessionId;

    /// Parse the textual form of a session id, as produced by [`Uuid`]'s `Display`.
    ///
    /// Returns `None` for missing, empty, malformed or all-zero input.
    /// Parsed ids are not new.
    fn create_from(&self, value: Option<&str>) -> Option<SessionId> {
        parse_session_id(value?)
    }
}

fn parse_session_id(value: &str) -> Option<SessionId> {
    let value = Uuid::parse_str(value).ok()?;
    if value.is_nil() {
        None
    } else {
        Some(SessionId::new(value, false))
    }
}

/// The default session id factory with focus on security.
/// It uses [`rand::thread_rng`] as a random source, which is a cryptographically secure generator,
/// and formats the 128 random bits as a version 4 UUID.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultSessionIdFactory;

impl SessionIdFactory for DefaultSessionIdFactory {
    fn create_new(&self) -> SessionId {
        let bytes: [u8; 16] = rand::thread_rng().gen();
        let id = SessionId::new(Builder::from_random_bytes(bytes).into_uuid(), true);
        debug!("Minted new session id");
        id
    }
}

/// A debug session id factory that mints an ascending sequence of ids, starting at one.
///
/// **Never use this outside of tests**, the ids are trivially guessable.
#[derive(Debug, Default)]
pub struct DebugSessionIdFactory {
    next_index: Mutex<u128>,
}

impl DebugSessionIdFactory {
    /// Returns the id that the `n`-th call to [`SessionIdFactory::create_new`] returns, counting from zero.
    pub fn nth(n: u128) -> SessionId {
        SessionId::new(Uuid::from_u128(n + 1), true)
    }
}

impl SessionIdFactory for DebugSessionIdFactory {
    fn create_new(&self) -> SessionId {
        let mut next_index = self.next_index.lock();
        let id = Self::nth(*next_index);
        *next_index += 1;
        id
    }
}
