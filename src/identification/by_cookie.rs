use super::{validate_name, IdentificationMethod, DEFAULT_SESSION_ID_NAME};
use crate::{
    CryptographyConfiguration, DefaultSessionIdFactory, Error, Result, SessionId, TransportCodec,
};
use cookie::Cookie;
use http::header::{COOKIE, SET_COOKIE};
use http::{request, response, HeaderValue};
use std::sync::Arc;

/// Identifies sessions by an http-only cookie.
#[derive(Debug, Clone)]
pub struct CookieIdentificationMethod {
    codec: TransportCodec,
    cookie_name: String,
    domain: Option<String>,
    path: Option<String>,
}

impl CookieIdentificationMethod {
    /// Create a method that protects session ids with `crypto`, using the cookie `_nsid`.
    pub fn new(crypto: CryptographyConfiguration) -> Self {
        Self::with_codec(TransportCodec::new(crypto, Arc::new(DefaultSessionIdFactory)))
    }

    /// Create a method that uses the given codec, using the cookie `_nsid`.
    pub fn with_codec(codec: TransportCodec) -> Self {
        Self {
            codec,
            cookie_name: DEFAULT_SESSION_ID_NAME.to_owned(),
            domain: None,
            path: None,
        }
    }

    /// Use the cookie `cookie_name`. Fails if the name is blank.
    pub fn with_cookie_name(mut self, cookie_name: impl Into<String>) -> Result<Self> {
        self.cookie_name = validate_name(cookie_name.into())?;
        Ok(self)
    }

    /// Restrict the cookie to `domain`.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Restrict the cookie to `path`.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// The name of the cookie.
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// The domain of the cookie, if restricted.
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    /// The path of the cookie, if restricted.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    fn request_cookie(&self, request: &request::Parts) -> Option<String> {
        request
            .headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|header| header.to_str().ok())
            .flat_map(|header| Cookie::split_parse(header))
            .filter_map(|cookie| cookie.ok())
            .find(|cookie| cookie.name() == self.cookie_name)
            .map(|cookie| cookie.value().to_owned())
    }
}

impl IdentificationMethod for CookieIdentificationMethod {
    fn current_session_id(&self, request: &request::Parts) -> SessionId {
        self.codec.open(self.request_cookie(request).as_deref())
    }

    fn save_session_id(
        &self,
        id: &SessionId,
        _request: &request::Parts,
        response: &mut response::Parts,
    ) -> Result {
        if id.is_empty() {
            return Err(Error::EmptySessionId);
        }
        if !id.is_new() {
            return Ok(());
        }

        let data = self.codec.seal(id)?;
        let mut cookie =
            Cookie::build((self.cookie_name.clone(), self.codec.encode(&data))).http_only(true);
        if let Some(domain) = &self.domain {
            cookie = cookie.domain(domain.clone());
        }
        if let Some(path) = &self.path {
            cookie = cookie.path(path.clone());
        }

        let header = HeaderValue::from_str(&cookie.build().to_string())?;
        response.headers.append(SET_COOKIE, header);
        Ok(())
    }
}
