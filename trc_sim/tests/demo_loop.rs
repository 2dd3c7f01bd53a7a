//! End-to-end run of the demo routine on a simulated clock.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use trc_core::clock::{Clock, SimClock};
use trc_core::config::CoreConfig;
use trc_core::cycle::Pacing;
use trc_core::task::RunMode;
use trc_sim::demo::{COMMAND_REG, COMMAND_VALUE, DemoParams, DemoRig, STATUS_REG};

fn fast_config() -> CoreConfig {
    let mut config = CoreConfig::default();
    config.sensor.calibration_interval_ms = 0;
    config.sensor.calibration_samples = 10;
    config
}

#[test]
fn demo_routine_completes_on_simulated_clock() {
    let clock = SimClock::new();
    let DemoRig {
        mut runner,
        mut mode,
        bus,
        timers,
    } = DemoRig::new(&fast_config(), clock.shared(), DemoParams::default());

    let stats = runner
        .run(
            RunMode::Autonomous,
            &mut mode,
            Some(200),
            &Pacing::Simulated(clock.clone()),
        )
        .expect("run");

    assert_eq!(stats.cycle_count, 200);
    assert_eq!(clock.now().as_millis(), 1000);
    assert_eq!(stats.task_failures, 0);

    let report = mode.report();
    let finished = report.finished_at.expect("routine finished");
    assert!(finished >= DemoParams::default().settle);
    assert!(report.status_polls >= 6, "polls {}", report.status_polls);
    assert!(report.command_written);
    assert_eq!(bus.register(COMMAND_REG), COMMAND_VALUE);
    assert!(bus.register(STATUS_REG) >= 5);
    assert!(report.velocity > 0.0);
    assert!(report.distance > 0.0);
    assert!(report.drive_position > 0.0);
    assert!(report.sonar_cm < 150.0 && report.sonar_cm > 0.0);
    assert_eq!(timers.armed_count(), 0);
}

#[test]
fn short_run_stops_cleanly_before_finishing() {
    let clock = SimClock::new();
    let DemoRig {
        mut runner,
        mut mode,
        bus,
        ..
    } = DemoRig::new(&fast_config(), clock.shared(), DemoParams::default());

    runner
        .run(
            RunMode::Autonomous,
            &mut mode,
            Some(10),
            &Pacing::Simulated(clock.clone()),
        )
        .expect("run");

    assert!(mode.report().finished_at.is_none());
    assert!(runner.mode().is_none());
    assert_eq!(bus.transfer_counts(), (0, 0));
}

#[test]
fn shipped_config_loads() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/trc.toml");
    let config = CoreConfig::load(&path).expect("shipped config");
    assert_eq!(config.shared.service_name, "trc-sim");
    assert_eq!(config.scheduler.periodic_interval_ms, 20);
    assert_eq!(config.i2c.max_transfer_len, 26);
}

#[test]
fn demo_runs_from_config_file() {
    let mut file = NamedTempFile::new().expect("temp file");
    writeln!(
        file,
        r#"
[scheduler]
periodic_interval_ms = 10
continuous_interval_ms = 5

[sensor]
calibration_samples = 4
calibration_interval_ms = 0
"#
    )
    .expect("write config");

    let config = CoreConfig::load(file.path()).expect("load");
    let clock = SimClock::new();
    let DemoRig {
        mut runner,
        mut mode,
        ..
    } = DemoRig::new(&config, clock.shared(), DemoParams::default());

    let stats = runner
        .run(
            RunMode::Test,
            &mut mode,
            Some(200),
            &Pacing::Simulated(clock.clone()),
        )
        .expect("run");

    assert_eq!(stats.periodic_count, 100);
    assert!(mode.report().command_written);
}
