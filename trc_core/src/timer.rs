//! One-shot timers that signal an [`Event`] when their deadline passes.
//!
//! Timers are serviced by the [`TimerManager`] task in the pre-continuous
//! phase: no thread per timer, a deadline is only observed when the
//! scheduler ticks. Each [`Timer`] has at most one outstanding deadline;
//! arming it again replaces the previous one.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use crate::clock::SharedClock;
use crate::error::{TaskError, TimerError};
use crate::event::Event;
use crate::task::{PhaseSet, RunMode, Task, TaskHandle, TaskManager};

#[derive(Debug)]
struct Armed {
    deadline: Duration,
    event: Event,
}

#[derive(Debug)]
struct TimerSlot {
    name: String,
    armed: Mutex<Option<Armed>>,
}

type ActiveList = Arc<Mutex<Vec<Arc<TimerSlot>>>>;

/// Handle onto a single one-shot timer.
///
/// Created by [`TimerManager::create_timer`].
#[derive(Clone)]
pub struct Timer {
    slot: Arc<TimerSlot>,
    clock: SharedClock,
    active: ActiveList,
}

impl Timer {
    /// Timer name.
    pub fn name(&self) -> &str {
        &self.slot.name
    }

    /// Arm the timer to signal `event` once `duration` has elapsed from now.
    ///
    /// Any previous deadline is cancelled without signaling its event.
    /// `event` is cleared on arming so an earlier signal cannot satisfy the
    /// new wait.
    ///
    /// # Errors
    /// `TimerError::Overflow` if the deadline does not fit the clock range.
    /// Neither the timer nor `event` is touched in that case.
    pub fn set(&self, duration: Duration, event: &Event) -> Result<(), TimerError> {
        let deadline = self
            .clock
            .now()
            .checked_add(duration)
            .ok_or(TimerError::Overflow(duration))?;
        event.clear();
        *self.slot.armed.lock() = Some(Armed {
            deadline,
            event: event.clone(),
        });

        let mut active = self.active.lock();
        if !active.iter().any(|s| Arc::ptr_eq(s, &self.slot)) {
            active.push(Arc::clone(&self.slot));
        }
        debug!(timer = %self.slot.name, event = event.name(), ?duration, "timer armed");
        Ok(())
    }

    /// Arm the timer with a duration in seconds.
    ///
    /// # Errors
    /// `TimerError::InvalidDuration` for negative, NaN or infinite values,
    /// `TimerError::Overflow` for deadlines past the clock range. The timer
    /// is left untouched in both cases.
    pub fn set_secs(&self, secs: f64, event: &Event) -> Result<(), TimerError> {
        let duration =
            Duration::try_from_secs_f64(secs).map_err(|_| TimerError::InvalidDuration(secs))?;
        self.set(duration, event)
    }

    /// Disarm without signaling.
    pub fn cancel(&self) {
        if self.slot.armed.lock().take().is_some() {
            debug!(timer = %self.slot.name, "timer cancelled");
        }
    }

    /// Whether a deadline is outstanding.
    pub fn is_armed(&self) -> bool {
        self.slot.armed.lock().is_some()
    }
}

impl std::fmt::Debug for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timer")
            .field("name", &self.slot.name)
            .field("armed", &self.is_armed())
            .finish()
    }
}

/// Owner of all timers; checks deadlines once per scheduler tick.
pub struct TimerManager {
    clock: SharedClock,
    active: ActiveList,
}

impl TimerManager {
    /// Create a manager reading time from `clock`.
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            active: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a manager and register it for the pre-continuous phase, where
    /// deadlines are checked, and the stop phase, where every timer is
    /// disarmed so nothing armed in one run mode fires in the next.
    pub fn install(clock: SharedClock, tasks: &TaskManager) -> Arc<Self> {
        let mgr = Arc::new(Self::new(clock));
        let handle: TaskHandle = mgr.clone();
        tasks.register_task(handle, PhaseSet::PRE_CONTINUOUS | PhaseSet::STOP);
        mgr
    }

    /// Create a new, disarmed timer.
    pub fn create_timer(&self, name: impl Into<String>) -> Timer {
        Timer {
            slot: Arc::new(TimerSlot {
                name: name.into(),
                armed: Mutex::new(None),
            }),
            clock: Arc::clone(&self.clock),
            active: Arc::clone(&self.active),
        }
    }

    /// Number of armed timers.
    pub fn armed_count(&self) -> usize {
        self.active
            .lock()
            .iter()
            .filter(|s| s.armed.lock().is_some())
            .count()
    }

    /// Signal and disarm every timer whose deadline has passed.
    ///
    /// Returns the number of timers that expired.
    pub fn service(&self) -> usize {
        let now = self.clock.now();
        let mut expired = 0;

        self.active.lock().retain(|slot| {
            let mut armed = slot.armed.lock();
            let due = match armed.as_ref() {
                None => return false,
                Some(a) => a.deadline <= now,
            };
            if !due {
                return true;
            }
            if let Some(a) = armed.take() {
                a.event.signal();
                trace!(timer = %slot.name, event = a.event.name(), "timer expired");
                expired += 1;
            }
            false
        });
        expired
    }
}

impl Task for TimerManager {
    fn name(&self) -> &str {
        "TimerManager"
    }

    fn pre_continuous_task(&self, _mode: RunMode) -> Result<(), TaskError> {
        self.service();
        Ok(())
    }

    fn stop_task(&self, mode: RunMode) -> Result<(), TaskError> {
        let mut disarmed = 0;
        for slot in self.active.lock().drain(..) {
            if slot.armed.lock().take().is_some() {
                disarmed += 1;
            }
        }
        if disarmed > 0 {
            debug!(%mode, disarmed, "timers disarmed on stop");
        }
        Ok(())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SimClock;
    use crate::task::Phase;

    fn setup() -> (SimClock, TimerManager) {
        let clock = SimClock::new();
        let mgr = TimerManager::new(clock.shared());
        (clock, mgr)
    }

    #[test]
    fn fires_once_after_deadline() {
        let (clock, mgr) = setup();
        let timer = mgr.create_timer("t");
        let event = Event::new("e");

        timer.set(Duration::from_millis(100), &event).expect("arm");
        clock.advance_ms(99);
        assert_eq!(mgr.service(), 0);
        assert!(!event.is_signaled());

        clock.advance_ms(1);
        assert_eq!(mgr.service(), 1);
        assert!(event.is_signaled());
        assert!(!timer.is_armed());

        event.clear();
        clock.advance_ms(500);
        assert_eq!(mgr.service(), 0);
        assert!(!event.is_signaled());
    }

    #[test]
    fn rearm_replaces_deadline() {
        let (clock, mgr) = setup();
        let timer = mgr.create_timer("t");
        let first = Event::new("first");
        let second = Event::new("second");

        timer.set(Duration::from_millis(10), &first).expect("arm");
        timer.set(Duration::from_millis(50), &second).expect("arm");
        assert_eq!(mgr.armed_count(), 1);

        clock.advance_ms(20);
        mgr.service();
        assert!(!first.is_signaled());
        assert!(!second.is_signaled());

        clock.advance_ms(30);
        mgr.service();
        assert!(!first.is_signaled());
        assert!(second.is_signaled());
    }

    #[test]
    fn cancel_disarms_without_signal() {
        let (clock, mgr) = setup();
        let timer = mgr.create_timer("t");
        let event = Event::new("e");

        timer.set(Duration::from_millis(10), &event).expect("arm");
        timer.cancel();
        clock.advance_ms(100);
        mgr.service();
        assert!(!event.is_signaled());
        assert_eq!(mgr.armed_count(), 0);
    }

    #[test]
    fn invalid_seconds_rejected_without_arming() {
        let (_clock, mgr) = setup();
        let timer = mgr.create_timer("t");
        let event = Event::new("e");

        assert_eq!(
            timer.set_secs(-1.0, &event),
            Err(TimerError::InvalidDuration(-1.0))
        );
        assert!(timer.set_secs(f64::NAN, &event).is_err());
        assert!(!timer.is_armed());

        assert!(timer.set_secs(0.25, &event).is_ok());
        assert!(timer.is_armed());
    }

    #[test]
    fn overflowing_deadline_rejected_without_touching_event() {
        let (clock, mgr) = setup();
        let timer = mgr.create_timer("t");
        let event = Event::new("e");
        clock.advance_ms(1000);
        event.signal();

        assert_eq!(
            timer.set(Duration::MAX, &event),
            Err(TimerError::Overflow(Duration::MAX))
        );
        assert!(event.is_signaled());
        assert!(!timer.is_armed());
        assert_eq!(mgr.armed_count(), 0);

        let near_max = Duration::MAX - Duration::from_millis(500);
        assert_eq!(
            timer.set(near_max, &event),
            Err(TimerError::Overflow(near_max))
        );
        assert!(event.is_signaled());
        assert!(!timer.is_armed());
    }

    #[test]
    fn stop_phase_disarms_installed_timers() {
        let clock = SimClock::new();
        let tasks = TaskManager::new();
        let mgr = TimerManager::install(clock.shared(), &tasks);
        let timer = mgr.create_timer("t");
        let event = Event::new("e");

        timer.set(Duration::from_millis(100), &event).expect("arm");
        tasks.run_phase(Phase::Stop, RunMode::Autonomous);
        assert!(!timer.is_armed());
        assert_eq!(mgr.armed_count(), 0);

        clock.advance_ms(200);
        tasks.run_phase(Phase::PreContinuous, RunMode::Teleop);
        assert!(!event.is_signaled());
    }

    #[test]
    fn zero_duration_fires_on_next_service() {
        let (_clock, mgr) = setup();
        let timer = mgr.create_timer("t");
        let event = Event::new("e");
        timer.set(Duration::ZERO, &event).expect("arm");
        mgr.service();
        assert!(event.is_signaled());
    }

    #[test]
    fn installed_manager_runs_in_pre_continuous() {
        let clock = SimClock::new();
        let tasks = TaskManager::new();
        let mgr = TimerManager::install(clock.shared(), &tasks);
        let timer = mgr.create_timer("t");
        let event = Event::new("e");

        timer.set(Duration::from_millis(5), &event).expect("arm");
        clock.advance_ms(5);
        tasks.run_phase(Phase::PrePeriodic, RunMode::Test);
        assert!(!event.is_signaled());
        tasks.run_phase(Phase::PreContinuous, RunMode::Test);
        assert!(event.is_signaled());
    }
}
