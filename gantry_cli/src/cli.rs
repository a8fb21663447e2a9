//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "gantry", version, about = "Gantry control core CLI")]
pub struct Cli {
    /// Path to config TOML (factory defaults when omitted)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Optional thermocouple calibration CSV (strict kind,key,value rows)
    #[arg(long, value_name = "FILE")]
    pub calibration: Option<PathBuf>,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Memory locking mode for real-time operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum RtLock {
    /// Do not lock memory
    None,
    /// Lock currently resident pages
    Current,
    /// Lock current and future pages
    All,
}

impl RtLock {
    #[inline]
    pub fn os_default() -> Self {
        if cfg!(target_os = "linux") {
            RtLock::Current
        } else {
            RtLock::None
        }
    }
}

/// Real-time flags shared by the looping subcommands.
#[derive(Debug, clap::Args)]
pub struct RtArgs {
    /// Enable real-time mode (SCHED_FIFO, affinity, mlockall)
    #[arg(
        long,
        action = ArgAction::SetTrue,
        long_help = "Enable real-time mode on supported OSes.\n\nLinux: attempts SCHED_FIFO priority, pins to one CPU, and locks process memory to reduce page faults and jitter. May require elevated privileges or raised memlock ulimits."
    )]
    pub rt: bool,

    /// SCHED_FIFO priority on Linux (1..=max); ignored elsewhere
    #[arg(long, value_name = "PRIO")]
    pub rt_prio: Option<i32>,

    /// Memory locking mode for --rt: none, current, or all
    #[arg(long, value_enum, value_name = "MODE")]
    pub rt_lock: Option<RtLock>,

    /// CPU index to pin the process to (Linux only; default 0)
    #[arg(long, value_name = "CPU")]
    pub rt_cpu: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the motion dispatcher and thermal loop, reading commands from stdin
    Run {
        #[command(flatten)]
        rt: RtArgs,
    },
    /// Regulate the heater toward a setpoint and report the outcome
    Heat {
        /// Target temperature in degrees C
        #[arg(long)]
        setpoint: f64,
        /// Stop after this many seconds and report the temperature reached
        #[arg(long, value_name = "S")]
        for_seconds: Option<u64>,
        #[command(flatten)]
        rt: RtArgs,
    },
    /// Quick health check (hardware presence / sim ok)
    SelfCheck,
}
