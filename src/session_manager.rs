use crate::{
    Clock, PeriodicCacheCleaner, Result, Session, SessionCache, SessionConfig, SessionRecord,
    SystemClock, ThreadTimer, Timer,
};
use http::{request, response};
use log::{trace, warn};
use std::sync::Arc;

/// Loads and saves the sessions of requests.
///
/// This is the user-facing interface of the crate.
/// It ties the identification method of its [`SessionConfig`] to a [`SessionCache`], and keeps
/// the cache trimmed with a [`PeriodicCacheCleaner`] as long as the manager lives.
#[derive(Debug)]
pub struct SessionManager {
    config: SessionConfig,
    session_timeout: chrono::Duration,
    cache: Arc<SessionCache>,
    clock: Arc<dyn Clock>,
    cleaner: Option<PeriodicCacheCleaner>,
}

impl SessionManager {
    /// Create a manager with a fresh cache on the system clock.
    /// The cache is trimmed on a dedicated thread, unless the trim interval of `config` is zero.
    pub fn new(config: SessionConfig) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let cache = Arc::new(SessionCache::new(clock.clone()));
        Self::with_parts(config, cache, clock, Box::new(ThreadTimer::new()))
    }

    /// Create a manager from its parts.
    ///
    /// `clock` decides when saved sessions were last saved; it should be the clock of `cache`.
    /// The cleaner runs on `timer`.
    pub fn with_parts(
        config: SessionConfig,
        cache: Arc<SessionCache>,
        clock: Arc<dyn Clock>,
        timer: Box<dyn Timer>,
    ) -> Result<Self> {
        config.validate()?;
        let session_timeout = config.chrono_session_timeout()?;

        let cleaner = if config.cache_trim_interval.is_zero() {
            warn!("The cache trim interval is zero, expired sessions are only evicted on lookup");
            None
        } else {
            let cleaner =
                PeriodicCacheCleaner::new(config.cache_trim_interval, cache.clone(), timer);
            cleaner.start()?;
            Some(cleaner)
        };

        Ok(Self {
            config,
            session_timeout,
            cache,
            clock,
            cleaner,
        })
    }

    /// The configuration of this manager.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The cache holding the sessions of this manager.
    pub fn cache(&self) -> &Arc<SessionCache> {
        &self.cache
    }

    /// Load the session of `request`.
    ///
    /// Returns an empty session if the request carries no valid session id, or if its session
    /// expired or was never saved. The returned session is unchanged until it is mutated.
    /// Fails with [`Error::Disposed`](crate::Error::Disposed) once the cache was disposed.
    pub fn load(&self, request: &request::Parts) -> Result<Session> {
        let id = self.config.identification_method.current_session_id(request);
        Ok(match self.cache.get(&id)? {
            Some(record) => record.session().to_unchanged(),
            None => Session::new(),
        })
    }

    /// Save `session` for `request`.
    ///
    /// Sessions that are absent, unchanged or empty are not saved.
    /// Otherwise, the session is stored under the id of the request, minting a new id if the
    /// request carried no valid one, and the new id is communicated through `response`.
    /// This must happen before the response is committed.
    pub fn save(
        &self,
        session: Option<&Session>,
        request: &request::Parts,
        response: &mut response::Parts,
    ) -> Result {
        let Some(session) = session else {
            return Ok(());
        };
        if !session.has_changed() || session.is_empty() {
            trace!("Not saving unchanged or empty session");
            return Ok(());
        }

        let method = &self.config.identification_method;
        let id = method.current_session_id(request);
        let record = SessionRecord::new(
            id,
            session.to_unchanged(),
            self.clock.now_utc(),
            self.session_timeout,
        )?;
        self.cache.set(record)?;
        method.save_session_id(&id, request, response)
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if let Some(cleaner) = &self.cleaner {
            cleaner.stop();
        }
    }
}
