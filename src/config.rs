//! Configuration of in-process sessions.

use crate::{
    CookieIdentificationMethod, CryptographyConfiguration, Error, IdentificationMethod,
    QueryParameterIdentificationMethod, Result, DEFAULT_SESSION_ID_NAME,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Default time after which an unsaved session expires.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// Default time between two trims of the session cache.
pub const DEFAULT_CACHE_TRIM_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Configuration of a [`SessionManager`](crate::SessionManager).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How sessions are identified from requests.
    pub identification_method: Arc<dyn IdentificationMethod>,

    /// Time after which a session that was not saved again expires. Must be greater than zero.
    pub session_timeout: Duration,

    /// Time between two trims of the session cache.
    /// Zero disables periodic trimming; expired sessions are then only evicted on lookup.
    pub cache_trim_interval: Duration,
}

impl Default for SessionConfig {
    /// Identifies sessions by cookie with random keys, which invalidates all sessions on restart.
    fn default() -> Self {
        Self::new(Arc::new(CookieIdentificationMethod::new(
            CryptographyConfiguration::random(),
        )))
    }
}

impl SessionConfig {
    /// Create a configuration with the given identification method and default timings.
    pub fn new(identification_method: Arc<dyn IdentificationMethod>) -> Self {
        Self {
            identification_method,
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            cache_trim_interval: DEFAULT_CACHE_TRIM_INTERVAL,
        }
    }

    /// Build a configuration from plain settings.
    ///
    /// `crypto` protects the session ids; [`SessionSettings::identify_by`] chooses between cookie
    /// and query parameter.
    pub fn from_settings(
        settings: &SessionSettings,
        crypto: CryptographyConfiguration,
    ) -> Result<Self> {
        let identification_method: Arc<dyn IdentificationMethod> = match settings.identify_by {
            IdentifyBy::Cookie => {
                let mut method = CookieIdentificationMethod::new(crypto)
                    .with_cookie_name(settings.name.clone())?;
                if let Some(domain) = &settings.cookie_domain {
                    method = method.with_domain(domain.clone());
                }
                if let Some(path) = &settings.cookie_path {
                    method = method.with_path(path.clone());
                }
                Arc::new(method)
            }
            IdentifyBy::QueryParameter => Arc::new(
                QueryParameterIdentificationMethod::new(crypto)
                    .with_parameter_name(settings.name.clone())?,
            ),
        };

        let config = Self::new(identification_method)
            .with_session_timeout(Duration::from_secs(settings.session_timeout_secs))
            .with_cache_trim_interval(Duration::from_secs(settings.cache_trim_interval_secs));
        config.validate()?;
        Ok(config)
    }

    /// Set the session timeout.
    pub fn with_session_timeout(mut self, session_timeout: Duration) -> Self {
        self.session_timeout = session_timeout;
        self
    }

    /// Set the cache trim interval.
    pub fn with_cache_trim_interval(mut self, cache_trim_interval: Duration) -> Self {
        self.cache_trim_interval = cache_trim_interval;
        self
    }

    /// Set the identification method.
    pub fn with_identification_method(
        mut self,
        identification_method: Arc<dyn IdentificationMethod>,
    ) -> Self {
        self.identification_method = identification_method;
        self
    }

    /// Returns true if the configuration can be used.
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Check that the configuration can be used.
    pub fn validate(&self) -> Result {
        if self.session_timeout.is_zero() {
            return Err(Error::InvalidConfiguration(
                "the session timeout must be greater than zero".to_owned(),
            ));
        }
        let too_large = chrono::Duration::from_std(self.session_timeout)
            .ok()
            .and_then(|timeout| Utc::now().checked_add_signed(timeout))
            .is_none();
        if too_large {
            return Err(Error::InvalidConfiguration(
                "the session timeout is too large".to_owned(),
            ));
        }
        Ok(())
    }

    /// The session timeout as a [`chrono::Duration`]. Only valid after [`SessionConfig::validate`].
    pub(crate) fn chrono_session_timeout(&self) -> Result<chrono::Duration> {
        chrono::Duration::from_std(self.session_timeout).map_err(|error| {
            Error::InvalidConfiguration(format!("the session timeout is too large: {error}"))
        })
    }
}

/// Which carrier transports the session id.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifyBy {
    /// An http-only cookie.
    #[default]
    Cookie,
    /// A query parameter, added through a redirect.
    QueryParameter,
}

/// Plain, serializable session settings, e.g. for a section of an application's config file.
///
/// ```rust
/// # use inproc_session::{IdentifyBy, SessionSettings};
/// let settings: SessionSettings = serde_json::from_str(
///     r#"{ "session_timeout_secs": 900, "identify_by": "query_parameter" }"#,
/// ).unwrap();
/// assert_eq!(settings.session_timeout_secs, 900);
/// assert_eq!(settings.cache_trim_interval_secs, 1800);
/// assert_eq!(settings.identify_by, IdentifyBy::QueryParameter);
/// assert_eq!(settings.name, "_nsid");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Session timeout, in seconds.
    pub session_timeout_secs: u64,
    /// Cache trim interval, in seconds. Zero disables periodic trimming.
    pub cache_trim_interval_secs: u64,
    /// Which carrier transports the session id.
    pub identify_by: IdentifyBy,
    /// Name of the cookie or query parameter.
    pub name: String,
    /// Domain of the cookie.
    pub cookie_domain: Option<String>,
    /// Path of the cookie.
    pub cookie_path: Option<String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            session_timeout_secs: DEFAULT_SESSION_TIMEOUT.as_secs(),
            cache_trim_interval_secs: DEFAULT_CACHE_TRIM_INTERVAL.as_secs(),
            identify_by: IdentifyBy::default(),
            name: DEFAULT_SESSION_ID_NAME.to_owned(),
            cookie_domain: None,
            cookie_path: None,
        }
    }
}
