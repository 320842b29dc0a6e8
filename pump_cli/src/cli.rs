//! Command-line surface of the station controller.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Set once from `--json`; `main` reads it when printing a failure.
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "pump_cli", version, about = "Two-pump lift station controller")]
pub struct Cli {
    /// Station config file
    #[arg(long, value_name = "FILE", default_value = "etc/pump_station.toml")]
    pub config: PathBuf,

    /// Log and report as JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides [logging].level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the supervisory control loop until Ctrl-C
    Run {
        /// Stop after this many loop iterations
        #[arg(long, value_name = "N")]
        ticks: Option<u64>,
    },
    /// Read every switch and sensor once and report
    SelfCheck,
}
