//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "linefollow", version, about = "Line follower control loop")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/linefollow.toml")]
    pub config: PathBuf,

    /// Emit telemetry and errors as JSON lines instead of text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the control loop
    Run {
        /// Stop after this much loop time; otherwise run until Ctrl-C or console EOF
        #[arg(long, value_name = "MS")]
        duration_ms: Option<u64>,
        /// Drive the loop from a virtual clock advanced 1 ms per poll
        #[arg(long, action = ArgAction::SetTrue)]
        virtual_clock: bool,
        /// Enable the motor driver at startup (overrides [drive] start_enabled)
        #[arg(long, action = ArgAction::SetTrue)]
        start: bool,
        /// Do not read tuning commands from stdin
        #[arg(long, action = ArgAction::SetTrue)]
        no_console: bool,
        /// Enable real-time mode (SCHED_FIFO, mlockall)
        #[arg(
            long,
            action = ArgAction::SetTrue,
            long_help = "Enable real-time mode on Linux.\n\nAttempts SCHED_FIFO priority and calls mlockall(MCL_CURRENT|MCL_FUTURE) to lock the process address space into RAM. This reduces page faults and jitter in the 10 ms control cycle but may require CAP_SYS_NICE/CAP_IPC_LOCK or root. Failures are logged and the run continues."
        )]
        rt: bool,
        /// Real-time priority for SCHED_FIFO (1..=max)
        #[arg(long, value_name = "PRIO")]
        rt_prio: Option<i32>,
        /// Print control cycle latency stats on exit
        #[arg(long, action = ArgAction::SetTrue)]
        stats: bool,
    },
    /// Run recorded sensor frames through a fresh estimator and PID
    Replay {
        /// CSV file with header s0,...,s7
        #[arg(long, value_name = "FILE")]
        frames: PathBuf,
    },
    /// Quick health check (hardware presence / closed-loop sim)
    SelfCheck,
}
