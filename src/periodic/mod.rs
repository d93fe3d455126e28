use crate::{Error, Result};
use std::fmt::{Debug, Formatter};
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

mod cleaner;
mod timer;

pub use cleaner::PeriodicCacheCleaner;
pub use timer::{ManualTimer, ThreadTimer, Timer, TimerAction};

/// A cooperative stop signal, shared by all clones.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Default::default()
    }

    /// Signal cancellation to every holder of this token.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true once [`CancellationToken::cancel`] was called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// An action that runs periodically on a [`Timer`] until it is cancelled.
///
/// Cancellation is checked before every run, so a run that is in progress always completes.
pub struct PeriodicTask {
    action: Arc<dyn Fn() + Send + Sync>,
    timer: Box<dyn Timer>,
    disposed: Arc<AtomicBool>,
}

impl PeriodicTask {
    /// Create a task that runs `action` on `timer`. The task is not started.
    pub fn new(action: impl Fn() + Send + Sync + 'static, timer: Box<dyn Timer>) -> Self {
        Self {
            action: Arc::new(action),
            timer,
            disposed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Run the action every `interval`, the first time one `interval` from now.
    ///
    /// Once `cancellation` is cancelled, the next tick stops the schedule instead of running the
    /// action. Fails if `interval` is zero or the task was disposed.
    pub fn start(&self, interval: Duration, cancellation: CancellationToken) -> Result {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(Error::TaskDisposed);
        }
        if interval.is_zero() {
            return Err(Error::InvalidInterval);
        }

        let action = self.action.clone();
        let disposed = self.disposed.clone();
        self.timer.start_timer(
            interval,
            Box::new(move || {
                if cancellation.is_cancelled() || disposed.load(Ordering::SeqCst) {
                    return ControlFlow::Break(());
                }
                action();
                ControlFlow::Continue(())
            }),
        )
    }

    /// Stop the timer right away instead of waiting for the next tick to notice a cancellation.
    pub fn stop(&self) {
        self.timer.stop_timer();
    }

    /// Returns true while the timer of this task is running.
    pub fn is_started(&self) -> bool {
        self.timer.is_started()
    }

    /// Stop ticking for good. The task cannot be started again.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }
}

impl Debug for PeriodicTask {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodicTask")
            .field("timer", &self.timer)
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_task(timer: &ManualTimer) -> (Arc<AtomicUsize>, PeriodicTask) {
        let counter = Arc::new(AtomicUsize::new(0));
        let task_counter = counter.clone();
        let task = PeriodicTask::new(
            move || {
                task_counter.fetch_add(1, Ordering::SeqCst);
            },
            Box::new(timer.clone()),
        );
        (counter, task)
    }

    #[test]
    fn test_n_intervals_fire_n_times() {
        let timer = ManualTimer::new();
        let (counter, task) = counting_task(&timer);
        task.start(Duration::from_secs(60), CancellationToken::new())
            .unwrap();

        timer.advance(Duration::from_secs(59));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        timer.advance(Duration::from_secs(1));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        timer.advance(Duration::from_secs(180));
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_cancellation_is_checked_per_tick() {
        let timer = ManualTimer::new();
        let (counter, task) = counting_task(&timer);
        let token = CancellationToken::new();
        task.start(Duration::from_secs(1), token.clone()).unwrap();

        timer.advance(Duration::from_secs(2));
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        token.cancel();
        assert!(timer.is_started());
        timer.advance(Duration::from_secs(1));
        assert!(!timer.is_started());
        timer.advance(Duration::from_secs(10));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let timer = ManualTimer::new();
        let (_, task) = counting_task(&timer);
        assert!(matches!(
            task.start(Duration::ZERO, CancellationToken::new()),
            Err(Error::InvalidInterval)
        ));
        assert!(!task.is_started());
    }

    #[test]
    fn test_disposed_task() {
        let timer = ManualTimer::new();
        let (counter, task) = counting_task(&timer);
        task.start(Duration::from_secs(1), CancellationToken::new())
            .unwrap();
        task.dispose();
        timer.advance(Duration::from_secs(5));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(matches!(
            task.start(Duration::from_secs(1), CancellationToken::new()),
            Err(Error::TaskDisposed)
        ));
    }

    #[test]
    fn test_cancellation_token_is_shared_by_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
