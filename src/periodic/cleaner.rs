use super::{CancellationToken, PeriodicTask, Timer};
use crate::{Error, Result, SessionCache};
use log::{debug, trace};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Trims a [`SessionCache`] on a fixed interval.
#[derive(Debug)]
pub struct PeriodicCacheCleaner {
    interval: Duration,
    task: PeriodicTask,
    cancellation: Mutex<Option<CancellationToken>>,
}

impl PeriodicCacheCleaner {
    /// Create a cleaner that trims `cache` every `interval` on `timer`. The cleaner is not started.
    pub fn new(interval: Duration, cache: Arc<SessionCache>, timer: Box<dyn Timer>) -> Self {
        let task = PeriodicTask::new(
            move || match cache.trim() {
                Ok(removed) => trace!("Periodic trim removed {removed} expired sessions"),
                Err(Error::Disposed) => debug!("Skipping periodic trim of disposed session cache"),
                Err(error) => debug!("Periodic trim failed: {error}"),
            },
            timer,
        );
        Self {
            interval,
            task,
            cancellation: Mutex::new(None),
        }
    }

    /// The time between two trims.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start trimming. The first trim happens one interval from now.
    ///
    /// Fails with [`Error::InvalidInterval`] if the interval is zero.
    /// Starting a started cleaner restarts its schedule.
    pub fn start(&self) -> Result {
        let mut cancellation = self.cancellation.lock();
        if let Some(previous) = cancellation.take() {
            previous.cancel();
        }
        let token = CancellationToken::new();
        self.task.start(self.interval, token.clone())?;
        *cancellation = Some(token);
        Ok(())
    }

    /// Stop trimming. Does nothing if the cleaner is not started.
    pub fn stop(&self) {
        if let Some(token) = self.cancellation.lock().take() {
            token.cancel();
            self.task.stop();
        }
    }

    /// Returns true while the cleaner is trimming periodically.
    pub fn is_started(&self) -> bool {
        self.task.is_started()
    }
}
