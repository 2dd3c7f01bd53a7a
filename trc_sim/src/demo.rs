//! Demo autonomous routine wired to the simulated hardware.
//!
//! The routine exercises every part of the core in one run:
//!
//! 1. `Settle`: arm a timer and wait for it (event + timer + state machine).
//! 2. `Poll`: power the drive motor and poll the status register with a
//!    repeating I2C read until it reaches the threshold.
//! 3. `Command`: stop the motor and write the command register.
//! 4. `Report`: record sonar distance, encoder and integrated travel, then
//!    stop.
//!
//! The accelerometer integrates in the pre-continuous phase the whole time.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use trc_core::clock::SharedClock;
use trc_core::config::CoreConfig;
use trc_core::cycle::{CycleRunner, RobotMode};
use trc_core::event::Event;
use trc_core::i2c::{I2cDevice, ReadAction};
use trc_core::motor::MotorController;
use trc_core::sensor::{AccelOptions, Accelerometer, AnalogInput, Axis, SensorSettings};
use trc_core::state::{Flow, StateMachine};
use trc_core::task::{RunMode, TaskManager};
use trc_core::timer::{Timer, TimerManager};

use crate::drivers::simulation::{
    SimAccelerometer, SimI2cBus, SimI2cPort, SimMotor, SimSonar,
};

/// Status register polled by the routine.
pub const STATUS_REG: u8 = 0x20;
/// Command register written once the status is ready.
pub const COMMAND_REG: u8 = 0x10;
/// Value written to the command register.
pub const COMMAND_VALUE: u8 = 0xFF;
/// Drive motor encoder ticks per second at full power.
pub const DRIVE_TICKS_PER_SEC: f64 = 1120.0;
/// Forward acceleration per unit of drive power [m/s²].
pub const DRIVE_THRUST: f64 = 1.0;

/// Demo routine steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoStep {
    /// Wait for the robot to settle.
    Settle,
    /// Drive and poll the status register.
    Poll,
    /// Write the command register.
    Command,
    /// Record the outcome and stop.
    Report,
}

/// Tunables of the demo routine.
#[derive(Debug, Clone, Copy)]
pub struct DemoParams {
    /// Settle time before driving.
    pub settle: Duration,
    /// Status value that ends polling.
    pub status_threshold: u8,
    /// Drive motor power while polling.
    pub drive_power: f64,
    /// Readiness polls per simulated I2C transfer.
    pub i2c_busy_polls: u32,
}

impl Default for DemoParams {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(200),
            status_threshold: 5,
            drive_power: 0.5,
            i2c_busy_polls: 2,
        }
    }
}

/// What the routine observed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DemoReport {
    /// Completed reads of the status register.
    pub status_polls: u32,
    /// Whether the command register write completed.
    pub command_written: bool,
    /// Integrated X velocity at the end [m/s].
    pub velocity: f64,
    /// Integrated X distance at the end [m].
    pub distance: f64,
    /// Drive motor encoder position at the end [ticks].
    pub drive_position: f64,
    /// Last sonar reading [cm].
    pub sonar_cm: f64,
    /// Mode-relative time the routine finished.
    pub finished_at: Option<Duration>,
}

/// Demo autonomous routine.
pub struct DemoMode {
    params: DemoParams,
    sm: StateMachine<DemoStep>,
    timer: Timer,
    settled: Event,
    status_ready: Event,
    command_done: Event,
    polls: Arc<AtomicU32>,
    written: Arc<AtomicBool>,
    device: Arc<I2cDevice<SimI2cPort>>,
    accel: Arc<Accelerometer<SimAccelerometer>>,
    drive: SimMotor,
    sonar: AnalogInput<SimSonar>,
    report: DemoReport,
}

impl DemoMode {
    /// Outcome so far.
    pub fn report(&self) -> &DemoReport {
        &self.report
    }

    /// Current step.
    pub fn step(&self) -> Option<DemoStep> {
        self.sm.state()
    }

    fn run_step(&mut self, elapsed: Duration) {
        let Self {
            params,
            sm,
            timer,
            settled,
            status_ready,
            command_done,
            polls,
            written,
            device,
            accel,
            drive,
            sonar,
            report,
        } = self;

        sm.run_once(|sm, step| {
            debug!(?step, ?elapsed, "demo step");
            match step {
                DemoStep::Settle => {
                    match timer.set(params.settle, settled) {
                        Ok(()) => {
                            sm.add_event(settled);
                            sm.wait_for_events(DemoStep::Poll);
                        }
                        Err(e) => {
                            warn!(error = %e, "settle timer rejected");
                            sm.set_state(DemoStep::Poll);
                        }
                    }
                }

                DemoStep::Poll => {
                    set_drive(drive, params.drive_power);
                    let ready = status_ready.clone();
                    let polls = Arc::clone(polls);
                    let threshold = params.status_threshold;
                    let queued = device.read(STATUS_REG, 1, move |c| {
                        polls.fetch_add(1, Ordering::Relaxed);
                        if c.data[0] >= threshold {
                            ready.signal();
                            ReadAction::Done
                        } else {
                            ReadAction::Repeat
                        }
                    });
                    match queued {
                        Ok(()) => {
                            sm.add_event(status_ready);
                            sm.wait_for_events(DemoStep::Command);
                        }
                        Err(e) => {
                            warn!(error = %e, "status poll rejected");
                            sm.set_state(DemoStep::Report);
                        }
                    }
                }

                DemoStep::Command => {
                    set_drive(drive, 0.0);
                    let done = command_done.clone();
                    let written = Arc::clone(written);
                    let queued =
                        device.write(COMMAND_REG, 1, vec![COMMAND_VALUE], move |_, _| {
                            written.store(true, Ordering::Relaxed);
                            done.signal();
                        });
                    match queued {
                        Ok(()) => {
                            sm.add_event(command_done);
                            sm.wait_for_events(DemoStep::Report);
                        }
                        Err(e) => {
                            warn!(error = %e, "command write rejected");
                            sm.set_state(DemoStep::Report);
                        }
                    }
                }

                DemoStep::Report => {
                    report.status_polls = polls.load(Ordering::Relaxed);
                    report.command_written = written.load(Ordering::Relaxed);
                    match accel.velocity(Axis::X) {
                        Ok(v) => report.velocity = v,
                        Err(e) => warn!(error = %e, "velocity read failed"),
                    }
                    match accel.distance(Axis::X) {
                        Ok(d) => report.distance = d,
                        Err(e) => warn!(error = %e, "distance read failed"),
                    }
                    report.drive_position = drive.position();
                    match sonar.value() {
                        Ok(d) => report.sonar_cm = d.value,
                        Err(e) => warn!(error = %e, "sonar read failed"),
                    }
                    report.finished_at = Some(elapsed);
                    info!(
                        polls = report.status_polls,
                        velocity = report.velocity,
                        distance = report.distance,
                        drive_position = report.drive_position,
                        sonar_cm = report.sonar_cm,
                        "demo routine complete"
                    );
                    sm.stop();
                }
            }
            Flow::Yield
        });
    }
}

fn set_drive(drive: &mut SimMotor, power: f64) {
    if let Err(e) = drive.set_power(power) {
        warn!(motor = drive.name(), error = %e, "drive power rejected");
    }
}

impl RobotMode for DemoMode {
    fn mode_start(&mut self, mode: RunMode) {
        set_drive(&mut self.drive, 0.0);
        self.drive.reset_position();
        if let Err(e) = self.accel.calibrate() {
            warn!(error = %e, "accelerometer calibration failed");
        }
        self.accel.set_enabled(true);
        self.report = DemoReport::default();
        self.polls.store(0, Ordering::Relaxed);
        self.written.store(false, Ordering::Relaxed);
        self.sm.start(DemoStep::Settle);
        info!(%mode, "demo routine started");
    }

    fn mode_stop(&mut self, mode: RunMode) {
        self.accel.set_enabled(false);
        self.device.stop();
        set_drive(&mut self.drive, 0.0);
        self.sm.stop();
        info!(%mode, "demo routine stopped");
    }

    fn run_periodic(&mut self, _mode: RunMode, elapsed: Duration) {
        self.run_step(elapsed);
    }
}

/// Everything the demo needs, wired to one task manager.
pub struct DemoRig {
    /// Cycle runner driving the task manager.
    pub runner: CycleRunner,
    /// Demo routine.
    pub mode: DemoMode,
    /// Handle onto the simulated I2C registers.
    pub bus: SimI2cBus,
    /// Timer manager task.
    pub timers: Arc<TimerManager>,
}

impl DemoRig {
    /// Build the simulated robot from `config`, reading time from `clock`.
    pub fn new(config: &CoreConfig, clock: SharedClock, params: DemoParams) -> Self {
        let tasks = TaskManager::new();
        let timers = TimerManager::install(Arc::clone(&clock), &tasks);
        let settings = SensorSettings::from_config(config);

        let source = SimAccelerometer::new(Arc::clone(&clock), [0.05, -0.02, 9.81], 0.01);
        let drive = SimMotor::new("drive", Arc::clone(&clock), DRIVE_TICKS_PER_SEC)
            .with_thrust(source.command(), DRIVE_THRUST);
        let accel = Accelerometer::new(
            "imu",
            source,
            AccelOptions::INTEGRATE_X | AccelOptions::FILTER,
            settings,
            Arc::clone(&clock),
            tasks.clone(),
        );

        let sonar = AnalogInput::new(
            "sonar",
            SimSonar::new(Arc::clone(&clock), 150.0, 20.0),
            false,
            settings,
            Arc::clone(&clock),
        );

        let port = SimI2cPort::new(params.i2c_busy_polls).with_counter(STATUS_REG);
        let bus = port.bus();
        let device = I2cDevice::new(
            "status-board",
            port,
            &config.i2c,
            Arc::clone(&clock),
            tasks.clone(),
        );

        let mode = DemoMode {
            params,
            sm: StateMachine::new("demo"),
            timer: timers.create_timer("settle"),
            settled: Event::new("settled"),
            status_ready: Event::new("status-ready"),
            command_done: Event::new("command-done"),
            polls: Arc::new(AtomicU32::new(0)),
            written: Arc::new(AtomicBool::new(false)),
            device,
            accel,
            drive,
            sonar,
            report: DemoReport::default(),
        };
        let runner = CycleRunner::new(tasks, clock, &config.scheduler);

        Self {
            runner,
            mode,
            bus,
            timers,
        }
    }
}
