use crate::{Clock, Error, Result, SessionId, SessionRecord};
use log::{debug, trace};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Holds the sessions of one process.
///
/// Nothing is persisted: restarting the process loses every session.
///
/// Expired sessions are evicted lazily when they are looked up with [`SessionCache::get`], and in
/// bulk by [`SessionCache::trim`], which should be run on an intermittent basis
/// (see [`PeriodicCacheCleaner`](crate::PeriodicCacheCleaner)).
///
/// The cache is guarded by a single reader/writer lock.
/// Lookups run concurrently with each other; [`SessionCache::set`], [`SessionCache::trim`] and the
/// removal of an expired session found by a lookup are exclusive.
///
/// Once [`SessionCache::dispose`] was called, every operation fails with [`Error::Disposed`].
#[derive(Debug)]
pub struct SessionCache {
    /// `None` once disposed.
    sessions: RwLock<Option<HashMap<SessionId, SessionRecord>>>,
    clock: Arc<dyn Clock>,
}

impl SessionCache {
    /// Create a new empty cache that judges expiry by `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: RwLock::new(Some(HashMap::new())),
            clock,
        }
    }

    /// Returns the number of sessions in the cache.
    /// Expired sessions are counted until they are evicted.
    pub fn count(&self) -> Result<usize> {
        let sessions = self.sessions.read();
        Ok(sessions.as_ref().ok_or(Error::Disposed)?.len())
    }

    /// Returns true if the cache holds no sessions.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.count()? == 0)
    }

    /// Look up the session with the given `id`.
    ///
    /// If the session exists but is expired, it is removed from the cache and `None` is returned.
    pub fn get(&self, id: &SessionId) -> Result<Option<SessionRecord>> {
        let now = self.clock.now_utc();

        {
            let sessions = self.sessions.read();
            match sessions.as_ref().ok_or(Error::Disposed)?.get(id) {
                None => {
                    trace!("Session cache miss");
                    return Ok(None);
                }
                Some(record) if !record.is_expired(now) => {
                    trace!("Session cache hit");
                    return Ok(Some(record.clone()));
                }
                Some(_) => { /* expired, evict below */ }
            }
        }

        // The read guard is released before the write lock is taken; the session may have been
        // replaced or trimmed in between, so it is looked up again.
        let mut sessions = self.sessions.write();
        let sessions = sessions.as_mut().ok_or(Error::Disposed)?;
        match sessions.get(id) {
            Some(record) if record.is_expired(now) => {
                sessions.remove(id);
                debug!("Evicted expired session on lookup");
                Ok(None)
            }
            other => Ok(other.cloned()),
        }
    }

    /// Insert `record`, replacing any session with the same id.
    pub fn set(&self, record: SessionRecord) -> Result {
        let mut sessions = self.sessions.write();
        let sessions = sessions.as_mut().ok_or(Error::Disposed)?;
        sessions.insert(*record.id(), record);
        Ok(())
    }

    /// Remove all expired sessions, returning how many were removed.
    pub fn trim(&self) -> Result<usize> {
        let now = self.clock.now_utc();
        let mut sessions = self.sessions.write();
        let sessions = sessions.as_mut().ok_or(Error::Disposed)?;
        let initial_len = sessions.len();
        sessions.retain(|_, record| !record.is_expired(now));
        let removed = initial_len - sessions.len();
        trace!("Trimmed {removed} expired sessions");
        Ok(removed)
    }

    /// Call `f` on every session in the cache, in no particular order.
    /// `f` must not call back into the cache.
    pub fn for_each(&self, mut f: impl FnMut(&SessionRecord)) -> Result {
        let sessions = self.sessions.read();
        sessions
            .as_ref()
            .ok_or(Error::Disposed)?
            .values()
            .for_each(|record| f(record));
        Ok(())
    }

    /// Drop all sessions and shut the cache down.
    /// Disposing twice is allowed.
    pub fn dispose(&self) {
        *self.sessions.write() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ManualClock, Session};
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn id(n: u128) -> SessionId {
        SessionId::new(Uuid::from_u128(n), false)
    }

    fn setup() -> (Arc<ManualClock>, SessionCache) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = SessionCache::new(clock.clone());
        (clock, cache)
    }

    fn record_saved_ago(clock: &ManualClock, n: u128, ago: Duration) -> SessionRecord {
        SessionRecord::new(
            id(n),
            Session::new(),
            clock.now_utc() - ago,
            Duration::minutes(15),
        )
        .unwrap()
    }

    #[test]
    fn test_set_then_get() {
        let (clock, cache) = setup();
        let record = record_saved_ago(&clock, 1, Duration::zero());
        cache.set(record.clone()).unwrap();
        assert_eq!(cache.get(&id(1)).unwrap(), Some(record));
        assert_eq!(cache.get(&id(2)).unwrap(), None);
    }

    #[test]
    fn test_set_replaces_existing() {
        let (clock, cache) = setup();
        cache
            .set(record_saved_ago(&clock, 1, Duration::minutes(5)))
            .unwrap();
        let mut session = Session::new();
        session.insert("k", "v").unwrap();
        let replacement =
            SessionRecord::new(id(1), session, clock.now_utc(), Duration::minutes(15)).unwrap();
        cache.set(replacement.clone()).unwrap();
        assert_eq!(cache.count().unwrap(), 1);
        assert_eq!(cache.get(&id(1)).unwrap(), Some(replacement));
    }

    #[test]
    fn test_get_evicts_expired() {
        let (clock, cache) = setup();
        cache
            .set(record_saved_ago(&clock, 1, Duration::minutes(20)))
            .unwrap();
        cache
            .set(record_saved_ago(&clock, 2, Duration::minutes(3)))
            .unwrap();
        assert_eq!(cache.count().unwrap(), 2);

        assert_eq!(cache.get(&id(1)).unwrap(), None);
        assert_eq!(cache.count().unwrap(), 1);

        assert!(cache.get(&id(2)).unwrap().is_some());
        assert_eq!(cache.count().unwrap(), 1);
    }

    #[test]
    fn test_get_keeps_session_at_boundary() {
        let (clock, cache) = setup();
        cache
            .set(record_saved_ago(&clock, 1, Duration::zero()))
            .unwrap();
        clock.advance(Duration::minutes(15));
        assert!(cache.get(&id(1)).unwrap().is_some());
        clock.advance(Duration::milliseconds(1));
        assert!(cache.get(&id(1)).unwrap().is_none());
        assert!(cache.is_empty().unwrap());
    }

    #[test]
    fn test_trim_removes_only_expired() {
        let (clock, cache) = setup();
        for (n, minutes) in [(1, 20), (2, 3), (3, 16), (4, 0)] {
            cache
                .set(record_saved_ago(&clock, n, Duration::minutes(minutes)))
                .unwrap();
        }
        assert_eq!(cache.trim().unwrap(), 2);
        assert_eq!(cache.count().unwrap(), 2);
        let mut ids = Vec::new();
        cache.for_each(|record| ids.push(*record.id())).unwrap();
        ids.sort_by_key(|id| id.value());
        assert_eq!(ids, vec![id(2), id(4)]);
    }

    #[test]
    fn test_trim_survives_unrepresentable_deadline() {
        let (clock, cache) = setup();
        let record = SessionRecord::new(
            id(1),
            Session::new(),
            clock.now_utc(),
            Duration::seconds(10_000_000_000_000),
        )
        .unwrap();
        cache.set(record).unwrap();
        assert_eq!(cache.trim().unwrap(), 0);
        assert!(cache.get(&id(1)).unwrap().is_some());
    }

    #[test]
    fn test_disposed_cache_fails() {
        let (clock, cache) = setup();
        cache
            .set(record_saved_ago(&clock, 1, Duration::zero()))
            .unwrap();
        cache.dispose();
        assert!(matches!(cache.count(), Err(Error::Disposed)));
        assert!(matches!(cache.get(&id(1)), Err(Error::Disposed)));
        assert!(matches!(cache.trim(), Err(Error::Disposed)));
        assert!(matches!(
            cache.set(record_saved_ago(&clock, 2, Duration::zero())),
            Err(Error::Disposed)
        ));
        assert!(matches!(cache.for_each(|_| {}), Err(Error::Disposed)));
        cache.dispose();
    }

    #[test]
    fn test_concurrent_set_and_get() {
        let (clock, cache) = setup();
        cache
            .set(record_saved_ago(&clock, 1000, Duration::zero()))
            .unwrap();
        let before = cache.count().unwrap();
        let threads = 32;

        std::thread::scope(|scope| {
            for n in 0..threads {
                let cache = &cache;
                let clock = &clock;
                scope.spawn(move || {
                    // Ids start at one, the nil id cannot be stored.
                    let n = n + 1;
                    cache
                        .set(record_saved_ago(clock, n, Duration::zero()))
                        .unwrap();
                    let found = cache.get(&id(n)).unwrap().unwrap();
                    assert_eq!(found.id(), &id(n));
                });
            }
        });

        assert_eq!(cache.count().unwrap(), before + threads as usize);
    }

    #[test]
    fn test_trim_racing_get_and_set() {
        let (clock, cache) = setup();
        let expired = 1..=200u128;
        let fresh = 1001..=1200u128;
        for n in expired.clone() {
            cache
                .set(record_saved_ago(&clock, n, Duration::minutes(20)))
                .unwrap();
        }

        std::thread::scope(|scope| {
            let cache = &cache;
            let clock = &clock;
            for _ in 0..4 {
                scope.spawn(move || {
                    for _ in 0..50 {
                        cache.trim().unwrap();
                    }
                });
            }
            for chunk in 0..4u128 {
                let expired = expired.clone();
                scope.spawn(move || {
                    for n in expired.filter(|n| n % 4 == chunk) {
                        assert!(cache.get(&id(n)).unwrap().is_none());
                    }
                });
            }
            for chunk in 0..4u128 {
                let fresh = fresh.clone();
                scope.spawn(move || {
                    for n in fresh.filter(|n| n % 4 == chunk) {
                        cache
                            .set(record_saved_ago(clock, n, Duration::zero()))
                            .unwrap();
                        let found = cache.get(&id(n)).unwrap().unwrap();
                        assert_eq!(found.id(), &id(n));
                    }
                });
            }
        });

        assert_eq!(cache.count().unwrap(), 200);
        for n in fresh {
            assert!(cache.get(&id(n)).unwrap().is_some());
        }
        for n in expired {
            assert!(cache.get(&id(n)).unwrap().is_none());
        }
        assert_eq!(cache.trim().unwrap(), 0);
    }
}
