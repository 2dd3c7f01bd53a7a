//! # TRC Simulation Binary
//!
//! Runs the demo routine on simulated hardware through the full control core:
//! task manager, timers, state machines, sensor pipeline and async I2C.
//!
//! # Usage
//!
//! ```bash
//! # Simulated clock, 400 cycles, autonomous mode
//! trc_sim --config trc_sim/config/trc.toml
//!
//! # Real-time pacing until Ctrl-C
//! trc_sim --realtime --cycles 0
//!
//! # Verbose JSON logs
//! trc_sim -v --json
//! ```

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use trc_core::clock::{MonotonicClock, SimClock};
use trc_core::config::{CoreConfig, LogLevel};
use trc_core::cycle::Pacing;
use trc_core::task::RunMode;
use trc_sim::demo::{DemoParams, DemoRig};

/// Run mode selectable on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Autonomous,
    Teleop,
    Test,
}

impl From<ModeArg> for RunMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Autonomous => RunMode::Autonomous,
            ModeArg::Teleop => RunMode::Teleop,
            ModeArg::Test => RunMode::Test,
        }
    }
}

/// TRC simulator - demo control loop on simulated hardware
#[derive(Parser, Debug)]
#[command(name = "trc_sim")]
#[command(version)]
#[command(about = "Demo control loop for the TRC core on simulated hardware")]
#[command(long_about = None)]
struct Args {
    /// Path to the core configuration file (defaults apply when omitted)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Number of control cycles to run (0 = until Ctrl-C)
    #[arg(short = 'n', long, default_value_t = 400)]
    cycles: u64,

    /// Run mode passed to every task
    #[arg(short, long, value_enum, default_value = "autonomous")]
    mode: ModeArg,

    /// Pace on the wall clock instead of the simulated clock
    #[arg(long)]
    realtime: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() {
    if let Err(e) = run() {
        error!("simulation failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => CoreConfig::load(path)?,
        None => CoreConfig::default(),
    };

    setup_tracing(&args, config.shared.log_level);
    info!(
        "{} (trc_sim v{}) starting",
        config.shared.service_name,
        env!("CARGO_PKG_VERSION")
    );

    let (clock, pacing) = if args.realtime {
        (MonotonicClock::shared(), Pacing::Sleep)
    } else {
        let sim = SimClock::new();
        (sim.shared(), Pacing::Simulated(sim))
    };

    let DemoRig {
        mut runner,
        mut mode,
        bus,
        ..
    } = DemoRig::new(&config, clock, DemoParams::default());

    let running = runner.running_flag();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })?;

    let max_cycles = (args.cycles > 0).then_some(args.cycles);
    let stats = runner.run(args.mode.into(), &mut mode, max_cycles, &pacing)?;

    let report = mode.report();
    let (reads, writes) = bus.transfer_counts();
    info!(
        cycles = stats.cycle_count,
        periodic = stats.periodic_count,
        avg_us = stats.avg_cycle().as_micros() as u64,
        max_us = stats.max_cycle.as_micros() as u64,
        overruns = stats.overruns,
        task_failures = stats.task_failures,
        "run complete"
    );
    info!(
        status_polls = report.status_polls,
        command_written = report.command_written,
        velocity = report.velocity,
        distance = report.distance,
        drive_position = report.drive_position,
        sonar_cm = report.sonar_cm,
        i2c_reads = reads,
        i2c_writes = writes,
        "demo report"
    );
    if report.finished_at.is_none() {
        info!("demo routine did not finish; increase --cycles");
    }
    Ok(())
}

/// Setup tracing subscriber based on CLI arguments and configuration.
fn setup_tracing(args: &Args, configured: LogLevel) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        match configured {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
