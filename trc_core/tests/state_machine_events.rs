//! State machine sequencing driven by timers through the scheduler.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use trc_core::clock::SimClock;
use trc_core::config::SchedulerConfig;
use trc_core::cycle::{CycleRunner, RobotMode};
use trc_core::event::Event;
use trc_core::state::{Flow, StateMachine};
use trc_core::task::{RunMode, TaskManager};
use trc_core::timer::{Timer, TimerManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Drive,
    Turn,
    Park,
}

/// Autonomous routine: drive for 100 ms, turn for 50 ms, park.
struct Routine {
    sm: StateMachine<Step>,
    timer: Timer,
    event: Event,
    trace: Arc<Mutex<Vec<(Step, Duration)>>>,
}

impl RobotMode for Routine {
    fn mode_start(&mut self, _mode: RunMode) {
        self.sm.start(Step::Drive);
    }

    fn run_continuous(&mut self, _mode: RunMode, elapsed: Duration) {
        let Self {
            sm,
            timer,
            event,
            trace,
        } = self;
        sm.run_once(|sm, step| {
            trace.lock().push((step, elapsed));
            match step {
                Step::Drive => {
                    timer.set(Duration::from_millis(100), event).expect("arm");
                    sm.add_event(event);
                    sm.wait_for_events(Step::Turn);
                }
                Step::Turn => {
                    timer.set(Duration::from_millis(50), event).expect("arm");
                    sm.add_event(event);
                    sm.wait_for_events(Step::Park);
                }
                Step::Park => sm.stop(),
            }
            Flow::Yield
        });
    }
}

#[test]
fn timer_round_trip_advances_one_state_per_expiry() {
    let clock = SimClock::new();
    let tasks = TaskManager::new();
    let timers = TimerManager::install(clock.shared(), &tasks);
    let trace = Arc::new(Mutex::new(Vec::new()));
    let mut routine = Routine {
        sm: StateMachine::new("auto"),
        timer: timers.create_timer("step"),
        event: Event::new("step-done"),
        trace: Arc::clone(&trace),
    };

    let mut runner = CycleRunner::new(tasks, clock.shared(), &SchedulerConfig::default());
    runner.start_mode(RunMode::Autonomous, &mut routine);
    for _ in 0..60 {
        runner.tick(&mut routine).unwrap();
        clock.advance_ms(5);
    }

    let trace = trace.lock();
    let steps: Vec<Step> = trace.iter().map(|(s, _)| *s).collect();
    assert_eq!(steps, vec![Step::Drive, Step::Turn, Step::Park]);
    assert_eq!(trace[0].1, Duration::ZERO);
    assert_eq!(trace[1].1, Duration::from_millis(100));
    assert_eq!(trace[2].1, Duration::from_millis(150));
    assert!(!routine.sm.is_enabled());
}

#[test]
fn machine_blocked_until_all_events_signal() {
    let a = Event::new("lift-done");
    let b = Event::new("arm-done");
    let mut sm = StateMachine::new("sm");
    sm.start(Step::Drive);
    sm.add_event(&a);
    sm.add_event(&b);
    sm.wait_for_events(Step::Turn);

    let mut runs = 0;
    a.signal();
    sm.run_once(|_, _| {
        runs += 1;
        Flow::Yield
    });
    assert_eq!(runs, 0);

    b.signal();
    sm.run_once(|_, step| {
        assert_eq!(step, Step::Turn);
        runs += 1;
        Flow::Yield
    });
    assert_eq!(runs, 1);
}

#[test]
fn stale_signal_does_not_satisfy_rearmed_timer() {
    let clock = SimClock::new();
    let timers = TimerManager::new(clock.shared());
    let timer = timers.create_timer("t");
    let event = Event::new("e");

    event.signal();
    timer.set(Duration::from_millis(10), &event).expect("arm");
    assert!(!event.is_signaled());

    clock.advance_ms(10);
    timers.service();
    assert!(event.is_signaled());
}

/// Arms a timer on mode entry and does nothing else.
struct ArmOnStart {
    timer: Timer,
    event: Event,
}

impl RobotMode for ArmOnStart {
    fn mode_start(&mut self, _mode: RunMode) {
        self.timer
            .set(Duration::from_millis(100), &self.event)
            .expect("arm");
    }
}

#[test]
fn timer_armed_in_one_mode_does_not_fire_in_the_next() {
    let clock = SimClock::new();
    let tasks = TaskManager::new();
    let timers = TimerManager::install(clock.shared(), &tasks);
    let event = Event::new("auto-timeout");
    let mut auto = ArmOnStart {
        timer: timers.create_timer("auto"),
        event: event.clone(),
    };

    let mut runner = CycleRunner::new(tasks, clock.shared(), &SchedulerConfig::default());
    runner.start_mode(RunMode::Autonomous, &mut auto);
    assert!(auto.timer.is_armed());
    runner.stop_mode(&mut auto).unwrap();
    assert!(!auto.timer.is_armed());

    struct Idle;
    impl RobotMode for Idle {}
    let mut teleop = Idle;
    runner.start_mode(RunMode::Teleop, &mut teleop);
    clock.advance_ms(200);
    runner.tick(&mut teleop).unwrap();
    assert!(!event.is_signaled());
}
