use crate::{Error, Result, SessionId};
use http::{request, response};
use std::fmt::Debug;

mod by_cookie;
mod by_query;

pub use by_cookie::CookieIdentificationMethod;
pub use by_query::QueryParameterIdentificationMethod;

/// The default name of the cookie or query parameter that carries the session id.
pub const DEFAULT_SESSION_ID_NAME: &str = "_nsid";

/// A way of telling which session a request belongs to.
///
/// Implementations read the session id from the request, and hand new session ids to the client
/// through the response.
pub trait IdentificationMethod: Debug + Send + Sync {
    /// The id of the session the request belongs to.
    ///
    /// If the request carries no valid session id, a new one is minted.
    fn current_session_id(&self, request: &request::Parts) -> SessionId;

    /// Communicate `id` to the client through `response`, if the client does not know it yet.
    ///
    /// Ids that are not [new](SessionId::is_new) leave the response untouched.
    /// Fails if `id` is empty.
    fn save_session_id(
        &self,
        id: &SessionId,
        request: &request::Parts,
        response: &mut response::Parts,
    ) -> Result;
}

fn validate_name(name: String) -> Result<String> {
    if name.trim().is_empty() {
        Err(Error::InvalidName)
    } else {
        Ok(name)
    }
}
