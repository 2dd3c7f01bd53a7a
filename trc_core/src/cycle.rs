//! Control cycle runner: drives the scheduler phases in a fixed order.
//!
//! ## Tick Body
//! 1. `PreContinuous` tasks → client `run_continuous` → `PostContinuous` tasks.
//! 2. If the periodic interval has elapsed: `PrePeriodic` tasks → client
//!    `run_periodic` → `PostPeriodic` tasks.
//!
//! `Start` runs once on [`CycleRunner::start_mode`], `Stop` once on
//! [`CycleRunner::stop_mode`].
//!
//! ## Pacing
//! [`Pacing::Sleep`] sleeps out the remainder of each tick on the real clock.
//! [`Pacing::Simulated`] advances a [`SimClock`] by one tick instead, so a
//! whole match can be replayed deterministically in a test.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clock::{SharedClock, SimClock};
use crate::config::SchedulerConfig;
use crate::task::{Phase, RunMode, TaskManager};

// ─── Cycle Statistics ───────────────────────────────────────────────

/// O(1) per-tick timing statistics.
#[derive(Debug, Clone)]
pub struct CycleStats {
    /// Total ticks executed.
    pub cycle_count: u64,
    /// Ticks that also ran the periodic phases.
    pub periodic_count: u64,
    /// Last tick duration.
    pub last_cycle: Duration,
    /// Shortest tick.
    pub min_cycle: Duration,
    /// Longest tick.
    pub max_cycle: Duration,
    /// Running sum for the average.
    pub sum_cycle: Duration,
    /// Ticks longer than the tick interval.
    pub overruns: u64,
    /// Task callbacks that returned an error.
    pub task_failures: u64,
}

impl CycleStats {
    /// Zeroed statistics.
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            periodic_count: 0,
            last_cycle: Duration::ZERO,
            min_cycle: Duration::MAX,
            max_cycle: Duration::ZERO,
            sum_cycle: Duration::ZERO,
            overruns: 0,
            task_failures: 0,
        }
    }

    /// Record one tick duration.
    #[inline]
    pub fn record(&mut self, duration: Duration) {
        self.cycle_count += 1;
        self.last_cycle = duration;
        self.min_cycle = self.min_cycle.min(duration);
        self.max_cycle = self.max_cycle.max(duration);
        self.sum_cycle += duration;
    }

    /// Average tick duration (zero if no ticks).
    pub fn avg_cycle(&self) -> Duration {
        if self.cycle_count == 0 {
            Duration::ZERO
        } else {
            let nanos = self.sum_cycle.as_nanos() / u128::from(self.cycle_count);
            Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
        }
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Client hooks ───────────────────────────────────────────────────

/// Code owned by the robot program for the active run mode.
///
/// Autonomous strategies and teleop handlers implement this; they are
/// clients of the core and run between the pre and post task phases.
pub trait RobotMode {
    /// Called after the `Start` phase.
    fn mode_start(&mut self, _mode: RunMode) {}

    /// Called before the `Stop` phase.
    fn mode_stop(&mut self, _mode: RunMode) {}

    /// Called at the periodic rate. `elapsed` is time since mode start.
    fn run_periodic(&mut self, _mode: RunMode, _elapsed: Duration) {}

    /// Called every tick. `elapsed` is time since mode start.
    fn run_continuous(&mut self, _mode: RunMode, _elapsed: Duration) {}
}

/// Errors from the cycle runner.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CycleError {
    /// `tick` or `stop_mode` called with no active run mode.
    #[error("no run mode is active")]
    NotStarted,
}

/// How [`CycleRunner::run`] waits between ticks.
#[derive(Debug, Clone)]
pub enum Pacing {
    /// Sleep on the real clock for the remainder of the tick.
    Sleep,
    /// Advance the given simulated clock by one tick interval.
    Simulated(SimClock),
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Whether the periodic phases ran.
    pub periodic: bool,
    /// Task callbacks that failed during this tick.
    pub failures: usize,
}

// ─── Cycle Runner ───────────────────────────────────────────────────

/// Drives a [`TaskManager`] through the phases of each control cycle.
pub struct CycleRunner {
    tasks: TaskManager,
    clock: SharedClock,
    periodic_interval: Duration,
    tick_interval: Duration,
    mode: Option<RunMode>,
    mode_started_at: Duration,
    next_periodic: Duration,
    stats: CycleStats,
    running: Arc<AtomicBool>,
}

impl CycleRunner {
    /// Create a runner over `tasks` with the given pacing configuration.
    pub fn new(tasks: TaskManager, clock: SharedClock, config: &SchedulerConfig) -> Self {
        Self {
            tasks,
            clock,
            periodic_interval: config.periodic_interval(),
            tick_interval: config.continuous_interval(),
            mode: None,
            mode_started_at: Duration::ZERO,
            next_periodic: Duration::ZERO,
            stats: CycleStats::new(),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Task manager driven by this runner.
    pub fn tasks(&self) -> &TaskManager {
        &self.tasks
    }

    /// Active run mode.
    pub fn mode(&self) -> Option<RunMode> {
        self.mode
    }

    /// Timing statistics.
    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    /// Flag that keeps [`CycleRunner::run`] looping; clear it to stop.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Enter `mode`: run the `Start` phase once, then the client hook.
    ///
    /// An already active mode is stopped first.
    pub fn start_mode(&mut self, mode: RunMode, client: &mut dyn RobotMode) {
        if let Some(previous) = self.mode.take() {
            self.leave_mode(previous, client);
        }
        let now = self.clock.now();
        self.mode = Some(mode);
        self.mode_started_at = now;
        self.next_periodic = now;
        self.stats = CycleStats::new();

        info!(%mode, "run mode starting");
        let report = self.tasks.run_phase(Phase::Start, mode);
        self.stats.task_failures += report.failed as u64;
        client.mode_start(mode);
    }

    /// Leave the active mode: client hook, then the `Stop` phase once.
    pub fn stop_mode(&mut self, client: &mut dyn RobotMode) -> Result<(), CycleError> {
        let mode = self.mode.take().ok_or(CycleError::NotStarted)?;
        self.leave_mode(mode, client);
        Ok(())
    }

    fn leave_mode(&mut self, mode: RunMode, client: &mut dyn RobotMode) {
        client.mode_stop(mode);
        let report = self.tasks.run_phase(Phase::Stop, mode);
        self.stats.task_failures += report.failed as u64;
        info!(
            %mode,
            cycles = self.stats.cycle_count,
            overruns = self.stats.overruns,
            "run mode stopped"
        );
    }

    /// Execute one control cycle.
    pub fn tick(&mut self, client: &mut dyn RobotMode) -> Result<TickReport, CycleError> {
        let mode = self.mode.ok_or(CycleError::NotStarted)?;
        let start = self.clock.now();
        let elapsed = start.saturating_sub(self.mode_started_at);
        let mut report = TickReport::default();

        report.failures += self.tasks.run_phase(Phase::PreContinuous, mode).failed;
        client.run_continuous(mode, elapsed);
        report.failures += self.tasks.run_phase(Phase::PostContinuous, mode).failed;

        if start >= self.next_periodic {
            self.next_periodic += self.periodic_interval;
            if self.next_periodic <= start {
                // Fell more than a period behind; resynchronize instead of bursting.
                self.next_periodic = start + self.periodic_interval;
            }
            report.failures += self.tasks.run_phase(Phase::PrePeriodic, mode).failed;
            client.run_periodic(mode, elapsed);
            report.failures += self.tasks.run_phase(Phase::PostPeriodic, mode).failed;
            report.periodic = true;
            self.stats.periodic_count += 1;
        }

        let duration = self.clock.now().saturating_sub(start);
        self.stats.record(duration);
        self.stats.task_failures += report.failures as u64;
        if duration > self.tick_interval {
            self.stats.overruns += 1;
            debug!(?duration, budget = ?self.tick_interval, "tick overrun");
        }
        Ok(report)
    }

    /// Run `mode` until the running flag is cleared or `max_cycles` ticks
    /// have executed, then stop the mode.
    pub fn run(
        &mut self,
        mode: RunMode,
        client: &mut dyn RobotMode,
        max_cycles: Option<u64>,
        pacing: &Pacing,
    ) -> Result<CycleStats, CycleError> {
        self.running.store(true, Ordering::SeqCst);
        self.start_mode(mode, client);

        while self.running.load(Ordering::SeqCst) {
            if max_cycles.is_some_and(|max| self.stats.cycle_count >= max) {
                break;
            }
            let tick_start = self.clock.now();
            self.tick(client)?;

            match pacing {
                Pacing::Sleep => {
                    let spent = self.clock.now().saturating_sub(tick_start);
                    if let Some(remaining) = self.tick_interval.checked_sub(spent) {
                        std::thread::sleep(remaining);
                    }
                }
                Pacing::Simulated(clock) => clock.advance(self.tick_interval),
            }
        }

        if self.stats.task_failures > 0 {
            warn!(failures = self.stats.task_failures, "task callbacks failed during run");
        }
        let stats = self.stats.clone();
        self.stop_mode(client)?;
        self.running.store(false, Ordering::SeqCst);
        Ok(stats)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
