use crate::{Error, Result, Session, SessionId};
use chrono::{DateTime, Duration, Utc};

/// A session as held by the [`SessionCache`](crate::SessionCache).
///
/// Records are immutable: saving a session replaces its record wholesale.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    id: SessionId,
    session: Session,
    last_saved: DateTime<Utc>,
    timeout: Duration,
}

impl SessionRecord {
    /// Create a record for `session`, saved at `last_saved`, that expires `timeout` after that.
    ///
    /// Fails with [`Error::EmptySessionId`] if `id` is empty.
    pub fn new(
        id: SessionId,
        session: Session,
        last_saved: DateTime<Utc>,
        timeout: Duration,
    ) -> Result<Self> {
        if id.is_empty() {
            return Err(Error::EmptySessionId);
        }
        Ok(Self {
            id,
            session,
            last_saved,
            timeout,
        })
    }

    /// The id of the session.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// The data of the session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// When the session was saved.
    pub fn last_saved(&self) -> DateTime<Utc> {
        self.last_saved
    }

    /// How long the session lives after it was saved.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns true if the session timed out at `now`.
    /// A record is still alive at exactly `last_saved + timeout`.
    /// A deadline beyond the range of [`DateTime`] is never reached.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.last_saved
            .checked_add_signed(self.timeout)
            .map_or(false, |deadline| now > deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn record(last_saved: DateTime<Utc>, timeout: Duration) -> SessionRecord {
        SessionRecord::new(
            SessionId::new(Uuid::from_u128(7), false),
            Session::new(),
            last_saved,
            timeout,
        )
        .unwrap()
    }

    #[test]
    fn test_expiry_boundary_is_exclusive() {
        let saved = Utc::now();
        let record = record(saved, Duration::minutes(15));
        assert!(!record.is_expired(saved));
        assert!(!record.is_expired(saved + Duration::minutes(15)));
        assert!(record.is_expired(saved + Duration::minutes(15) + Duration::nanoseconds(1)));
    }

    #[test]
    fn test_expiry_examples() {
        let now = Utc::now();
        let timeout = Duration::minutes(15);
        assert!(record(now - Duration::minutes(20), timeout).is_expired(now));
        assert!(!record(now - Duration::minutes(3), timeout).is_expired(now));
    }

    #[test]
    fn test_unrepresentable_deadline_never_expires() {
        let now = Utc::now();
        let record = record(now, Duration::seconds(10_000_000_000_000));
        assert!(!record.is_expired(now));
        assert!(!record.is_expired(now + Duration::days(365)));
    }

    #[test]
    fn test_empty_id_is_rejected() {
        let result = SessionRecord::new(
            SessionId::empty(),
            Session::new(),
            Utc::now(),
            Duration::minutes(1),
        );
        assert!(matches!(result, Err(Error::EmptySessionId)));
    }
}
