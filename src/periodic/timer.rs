use crate::Result;
use log::debug;
use parking_lot::Mutex;
use std::fmt::{Debug, Formatter};
use std::ops::ControlFlow;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// The action a [`Timer`] runs on every tick.
/// Returning [`ControlFlow::Break`] stops the timer.
pub type TimerAction = Box<dyn FnMut() -> ControlFlow<()> + Send>;

/// Runs an action repeatedly, once per interval, starting one interval after the timer was started.
pub trait Timer: Debug + Send + Sync {
    /// Start running `action` every `interval`, replacing any previous schedule.
    fn start_timer(&self, interval: Duration, action: TimerAction) -> Result;

    /// Stop the schedule. A tick that is already running completes first.
    /// Stopping a timer that is not started does nothing.
    fn stop_timer(&self);

    /// Returns true while a schedule is active.
    fn is_started(&self) -> bool;
}

/// A timer backed by a dedicated thread.
#[derive(Debug, Default)]
pub struct ThreadTimer {
    running: Mutex<Option<RunningTimer>>,
}

#[derive(Debug)]
struct RunningTimer {
    stop: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl RunningTimer {
    fn stop(self) {
        // The thread may already have exited on its own, then there is nobody to receive this.
        let _ = self.stop.send(());
        if self.handle.thread().id() != thread::current().id() {
            let _ = self.handle.join();
        }
    }
}

impl ThreadTimer {
    /// Create a timer that is not started.
    pub fn new() -> Self {
        Default::default()
    }
}

fn run(interval: Duration, mut action: TimerAction, stop: mpsc::Receiver<()>) {
    loop {
        match stop.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {
                if action().is_break() {
                    debug!("Timer action asked to stop");
                    return;
                }
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

impl Timer for ThreadTimer {
    fn start_timer(&self, interval: Duration, action: TimerAction) -> Result {
        let mut running = self.running.lock();
        if let Some(previous) = running.take() {
            previous.stop();
        }

        let (stop, stopped) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("inproc-session-timer".to_owned())
            .spawn(move || run(interval, action, stopped))?;
        debug!("Started timer with interval {interval:?}");
        *running = Some(RunningTimer { stop, handle });
        Ok(())
    }

    fn stop_timer(&self) {
        if let Some(running) = self.running.lock().take() {
            running.stop();
            debug!("Stopped timer");
        }
    }

    fn is_started(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }
}

impl Drop for ThreadTimer {
    fn drop(&mut self) {
        self.stop_timer();
    }
}

/// A timer that only moves when told to, for deterministic tests.
///
/// Clones share the same schedule, so a test can keep a handle to advance time while the timer
/// itself is owned by the code under test.
#[derive(Debug, Clone, Default)]
pub struct ManualTimer {
    state: Arc<Mutex<ManualTimerState>>,
}

#[derive(Default)]
struct ManualTimerState {
    schedule: Option<(Duration, TimerAction)>,
    elapsed: Duration,
    ticks: usize,
}

impl Debug for ManualTimerState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualTimerState")
            .field("interval", &self.schedule.as_ref().map(|(interval, _)| interval))
            .field("elapsed", &self.elapsed)
            .field("ticks", &self.ticks)
            .finish()
    }
}

impl ManualTimer {
    /// Create a timer that is not started.
    pub fn new() -> Self {
        Default::default()
    }

    /// Let `by` pass, running the action once for every whole interval that elapsed.
    pub fn advance(&self, by: Duration) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.elapsed += by;

        while let Some((interval, action)) = state.schedule.as_mut() {
            if interval.is_zero() || state.elapsed < *interval {
                break;
            }
            state.elapsed -= *interval;
            state.ticks += 1;
            if action().is_break() {
                state.schedule = None;
            }
        }
    }

    /// The number of times the action ran since the timer was created.
    pub fn ticks(&self) -> usize {
        self.state.lock().ticks
    }
}

impl Timer for ManualTimer {
    fn start_timer(&self, interval: Duration, action: TimerAction) -> Result {
        let mut state = self.state.lock();
        state.schedule = Some((interval, action));
        state.elapsed = Duration::ZERO;
        Ok(())
    }

    fn stop_timer(&self) {
        self.state.lock().schedule = None;
    }

    fn is_started(&self) -> bool {
        self.state.lock().schedule.is_some()
    }
}
