//! Cooperative phase scheduler.
//!
//! Subsystems implement [`Task`] and register with a [`TaskManager`] for one
//! or more [`Phase`]s. The cycle runner calls [`TaskManager::run_phase`] for
//! each phase in a fixed order every control cycle; the manager invokes the
//! registered tasks in registration order.
//!
//! ## Dispatch rules
//! - Registration order == invocation order, per phase.
//! - A task is registered at most once per phase.
//! - The phase list is snapshotted before dispatch, so a task may register or
//!   unregister itself (or others) from inside a callback; the change applies
//!   from the next dispatch.
//! - A callback returning `Err` is logged and counted; the remaining tasks of
//!   the phase still run.

use bitflags::bitflags;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{trace, warn};

use crate::error::TaskError;

/// Competition phase passed to every task callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RunMode {
    /// Pre-programmed autonomous period.
    Autonomous,
    /// Driver-controlled period.
    #[default]
    Teleop,
    /// Test/diagnostic mode.
    Test,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Autonomous => "autonomous",
            Self::Teleop => "teleop",
            Self::Test => "test",
        };
        f.write_str(s)
    }
}

/// Scheduler invocation category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Once, on mode entry.
    Start,
    /// Once, on mode exit.
    Stop,
    /// Before the client's periodic code.
    PrePeriodic,
    /// After the client's periodic code.
    PostPeriodic,
    /// Before the client's continuous code (every runner tick).
    PreContinuous,
    /// After the client's continuous code (every runner tick).
    PostContinuous,
}

impl Phase {
    /// All phases, in registry slot order.
    pub const ALL: [Phase; 6] = [
        Phase::Start,
        Phase::Stop,
        Phase::PrePeriodic,
        Phase::PostPeriodic,
        Phase::PreContinuous,
        Phase::PostContinuous,
    ];

    #[inline]
    const fn slot(self) -> usize {
        match self {
            Phase::Start => 0,
            Phase::Stop => 1,
            Phase::PrePeriodic => 2,
            Phase::PostPeriodic => 3,
            Phase::PreContinuous => 4,
            Phase::PostContinuous => 5,
        }
    }

    /// Single-phase set.
    pub const fn as_set(self) -> PhaseSet {
        match self {
            Phase::Start => PhaseSet::START,
            Phase::Stop => PhaseSet::STOP,
            Phase::PrePeriodic => PhaseSet::PRE_PERIODIC,
            Phase::PostPeriodic => PhaseSet::POST_PERIODIC,
            Phase::PreContinuous => PhaseSet::PRE_CONTINUOUS,
            Phase::PostContinuous => PhaseSet::POST_CONTINUOUS,
        }
    }
}

bitflags! {
    /// Set of phases a task is registered for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PhaseSet: u8 {
        /// [`Phase::Start`]
        const START           = 1 << 0;
        /// [`Phase::Stop`]
        const STOP            = 1 << 1;
        /// [`Phase::PrePeriodic`]
        const PRE_PERIODIC    = 1 << 2;
        /// [`Phase::PostPeriodic`]
        const POST_PERIODIC   = 1 << 3;
        /// [`Phase::PreContinuous`]
        const PRE_CONTINUOUS  = 1 << 4;
        /// [`Phase::PostContinuous`]
        const POST_CONTINUOUS = 1 << 5;
    }
}

impl PhaseSet {
    /// Iterate the phases contained in this set, in slot order.
    pub fn phases(self) -> impl Iterator<Item = Phase> {
        Phase::ALL.into_iter().filter(move |p| self.contains(p.as_set()))
    }
}

/// Unit of periodic work.
///
/// Every hook has a no-op default so a task only implements the phases it
/// registers for. Hooks take `&self`; tasks keep their mutable state behind
/// their own lock so the manager can hold them as shared handles.
pub trait Task: Send + Sync {
    /// Name used in log output.
    fn name(&self) -> &str;

    /// Called once when a run mode starts.
    fn start_task(&self, _mode: RunMode) -> Result<(), TaskError> {
        Ok(())
    }

    /// Called once when a run mode stops.
    fn stop_task(&self, _mode: RunMode) -> Result<(), TaskError> {
        Ok(())
    }

    /// Called before the periodic client code.
    fn pre_periodic_task(&self, _mode: RunMode) -> Result<(), TaskError> {
        Ok(())
    }

    /// Called after the periodic client code.
    fn post_periodic_task(&self, _mode: RunMode) -> Result<(), TaskError> {
        Ok(())
    }

    /// Called before the continuous client code.
    fn pre_continuous_task(&self, _mode: RunMode) -> Result<(), TaskError> {
        Ok(())
    }

    /// Called after the continuous client code.
    fn post_continuous_task(&self, _mode: RunMode) -> Result<(), TaskError> {
        Ok(())
    }
}

/// Shared task handle. Identity is the allocation, not the name.
pub type TaskHandle = Arc<dyn Task>;

#[inline]
fn same_task(a: &TaskHandle, b: &TaskHandle) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

fn invoke(task: &dyn Task, phase: Phase, mode: RunMode) -> Result<(), TaskError> {
    match phase {
        Phase::Start => task.start_task(mode),
        Phase::Stop => task.stop_task(mode),
        Phase::PrePeriodic => task.pre_periodic_task(mode),
        Phase::PostPeriodic => task.post_periodic_task(mode),
        Phase::PreContinuous => task.pre_continuous_task(mode),
        Phase::PostContinuous => task.post_continuous_task(mode),
    }
}

/// Outcome of one phase dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Number of tasks invoked.
    pub invoked: usize,
    /// Number of callbacks that returned an error.
    pub failed: usize,
}

#[derive(Default)]
struct TaskRegistry {
    phases: [Vec<TaskHandle>; 6],
}

/// Phase-keyed task registry and dispatcher.
///
/// Cloning yields another handle onto the same registry; subsystems keep a
/// clone so they can register and unregister themselves.
#[derive(Clone, Default)]
pub struct TaskManager {
    registry: Arc<Mutex<TaskRegistry>>,
}

impl TaskManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `task` for every phase in `phases`.
    ///
    /// Phases the task is already registered for are left untouched. Returns
    /// `true` if the task was added to at least one phase.
    pub fn register_task(&self, task: TaskHandle, phases: PhaseSet) -> bool {
        let mut reg = self.registry.lock();
        let mut added = false;
        for phase in phases.phases() {
            let list = &mut reg.phases[phase.slot()];
            if list.iter().any(|t| same_task(t, &task)) {
                continue;
            }
            list.push(Arc::clone(&task));
            added = true;
        }
        if added {
            trace!(task = task.name(), ?phases, "task registered");
        }
        added
    }

    /// Remove `task` from every phase in `phases`. Returns `true` if it was
    /// registered for at least one of them.
    pub fn unregister_task(&self, task: &TaskHandle, phases: PhaseSet) -> bool {
        let mut reg = self.registry.lock();
        let mut removed = false;
        for phase in phases.phases() {
            let list = &mut reg.phases[phase.slot()];
            let before = list.len();
            list.retain(|t| !same_task(t, task));
            removed |= list.len() != before;
        }
        if removed {
            trace!(task = task.name(), ?phases, "task unregistered");
        }
        removed
    }

    /// Remove `task` from all phases.
    pub fn unregister_all(&self, task: &TaskHandle) -> bool {
        self.unregister_task(task, PhaseSet::all())
    }

    /// Whether `task` is registered for `phase`.
    pub fn is_registered(&self, task: &TaskHandle, phase: Phase) -> bool {
        self.registry.lock().phases[phase.slot()]
            .iter()
            .any(|t| same_task(t, task))
    }

    /// Number of tasks registered for `phase`.
    pub fn task_count(&self, phase: Phase) -> usize {
        self.registry.lock().phases[phase.slot()].len()
    }

    /// Drop every registration (shutdown).
    pub fn clear(&self) {
        let mut reg = self.registry.lock();
        for list in reg.phases.iter_mut() {
            list.clear();
        }
    }

    /// Invoke every task registered for `phase`, in registration order.
    pub fn run_phase(&self, phase: Phase, mode: RunMode) -> DispatchReport {
        let snapshot: Vec<TaskHandle> = self.registry.lock().phases[phase.slot()].clone();
        let mut report = DispatchReport::default();

        for task in &snapshot {
            report.invoked += 1;
            if let Err(e) = invoke(task.as_ref(), phase, mode) {
                report.failed += 1;
                warn!(task = task.name(), ?phase, %mode, error = %e, "task callback failed");
            }
        }
        report
    }
}

impl fmt::Debug for TaskManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reg = self.registry.lock();
        let mut d = f.debug_struct("TaskManager");
        for phase in Phase::ALL {
            let names: Vec<&str> = reg.phases[phase.slot()].iter().map(|t| t.name()).collect();
            d.field(&format!("{phase:?}"), &names);
        }
        d.finish()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl Task for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn pre_continuous_task(&self, mode: RunMode) -> Result<(), TaskError> {
            self.log.lock().push(format!("{}:{mode}", self.name));
            if self.fail {
                return Err(TaskError::Failed("boom".into()));
            }
            Ok(())
        }

        fn start_task(&self, _mode: RunMode) -> Result<(), TaskError> {
            self.log.lock().push(format!("{}:start", self.name));
            Ok(())
        }
    }

    fn recorder(name: &'static str, log: &Arc<Mutex<Vec<String>>>, fail: bool) -> TaskHandle {
        Arc::new(Recorder {
            name,
            log: Arc::clone(log),
            fail,
        })
    }

    #[test]
    fn phase_set_iterates_members() {
        let set = PhaseSet::START | PhaseSet::PRE_CONTINUOUS;
        let phases: Vec<Phase> = set.phases().collect();
        assert_eq!(phases, vec![Phase::Start, Phase::PreContinuous]);
    }

    #[test]
    fn double_registration_is_noop() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mgr = TaskManager::new();
        let t = recorder("a", &log, false);

        assert!(mgr.register_task(Arc::clone(&t), PhaseSet::PRE_CONTINUOUS));
        assert!(!mgr.register_task(Arc::clone(&t), PhaseSet::PRE_CONTINUOUS));
        assert_eq!(mgr.task_count(Phase::PreContinuous), 1);

        mgr.run_phase(Phase::PreContinuous, RunMode::Test);
        assert_eq!(log.lock().len(), 1);
    }

    #[test]
    fn registration_order_is_invocation_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mgr = TaskManager::new();
        for name in ["first", "second", "third"] {
            mgr.register_task(recorder(name, &log, false), PhaseSet::PRE_CONTINUOUS);
        }

        mgr.run_phase(Phase::PreContinuous, RunMode::Autonomous);
        assert_eq!(
            *log.lock(),
            vec!["first:autonomous", "second:autonomous", "third:autonomous"]
        );
    }

    #[test]
    fn failing_task_does_not_stop_dispatch() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mgr = TaskManager::new();
        mgr.register_task(recorder("bad", &log, true), PhaseSet::PRE_CONTINUOUS);
        mgr.register_task(recorder("good", &log, false), PhaseSet::PRE_CONTINUOUS);

        let report = mgr.run_phase(Phase::PreContinuous, RunMode::Teleop);
        assert_eq!(report, DispatchReport { invoked: 2, failed: 1 });
        assert_eq!(*log.lock(), vec!["bad:teleop", "good:teleop"]);
    }

    #[test]
    fn unregister_removes_only_named_phases() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mgr = TaskManager::new();
        let t = recorder("a", &log, false);
        mgr.register_task(Arc::clone(&t), PhaseSet::START | PhaseSet::PRE_CONTINUOUS);

        assert!(mgr.unregister_task(&t, PhaseSet::PRE_CONTINUOUS));
        assert!(mgr.is_registered(&t, Phase::Start));
        assert!(!mgr.is_registered(&t, Phase::PreContinuous));
        assert!(!mgr.unregister_task(&t, PhaseSet::PRE_CONTINUOUS));
    }

    #[test]
    fn identity_is_allocation_not_name() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mgr = TaskManager::new();
        mgr.register_task(recorder("same", &log, false), PhaseSet::START);
        mgr.register_task(recorder("same", &log, false), PhaseSet::START);
        assert_eq!(mgr.task_count(Phase::Start), 2);
    }

    struct SelfRemover {
        mgr: TaskManager,
        me: Mutex<Option<TaskHandle>>,
        calls: Mutex<u32>,
    }

    impl Task for SelfRemover {
        fn name(&self) -> &str {
            "self-remover"
        }

        fn pre_continuous_task(&self, _mode: RunMode) -> Result<(), TaskError> {
            *self.calls.lock() += 1;
            if let Some(me) = self.me.lock().take() {
                self.mgr.unregister_all(&me);
            }
            Ok(())
        }
    }

    #[test]
    fn task_may_unregister_itself_during_dispatch() {
        let mgr = TaskManager::new();
        let task = Arc::new(SelfRemover {
            mgr: mgr.clone(),
            me: Mutex::new(None),
            calls: Mutex::new(0),
        });
        let handle: TaskHandle = task.clone();
        *task.me.lock() = Some(Arc::clone(&handle));
        mgr.register_task(handle, PhaseSet::PRE_CONTINUOUS);

        mgr.run_phase(Phase::PreContinuous, RunMode::Test);
        mgr.run_phase(Phase::PreContinuous, RunMode::Test);
        assert_eq!(*task.calls.lock(), 1);
        assert_eq!(mgr.task_count(Phase::PreContinuous), 0);
    }

    #[test]
    fn start_phase_dispatches_start_hook() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mgr = TaskManager::new();
        mgr.register_task(recorder("a", &log, false), PhaseSet::START);
        mgr.run_phase(Phase::Start, RunMode::Test);
        assert_eq!(*log.lock(), vec!["a:start"]);
    }
}
