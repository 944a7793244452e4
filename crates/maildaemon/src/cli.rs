//! Command-line arguments.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};

/// Polls mail accounts and applies filter rules to what it finds.
#[derive(Debug, Parser)]
#[command(name = "maildaemon", version, about)]
pub struct Cli {
    /// Configuration file.
    #[arg(short, long, env = "MAILDAEMON_CONFIG", default_value = ".maildaemon.json")]
    pub config: PathBuf,

    /// Number of polling iterations, 0 for no limit.
    #[arg(short = 'n', long, default_value_t = 3)]
    pub max_iterations: usize,

    /// Minimum duration of one iteration, in seconds.
    #[arg(short, long, default_value_t = 4)]
    pub interval: u64,

    /// More output, repeatable.
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Less output, repeatable.
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "verbose")]
    pub quiet: u8,
}

impl Cli {
    pub const fn max_iterations(&self) -> Option<usize> {
        match self.max_iterations {
            0 => None,
            n => Some(n),
        }
    }

    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    /// Log level for the workspace crates when `RUST_LOG` is unset.
    pub fn log_level(&self) -> &'static str {
        match i16::from(self.verbose) - i16::from(self.quiet) {
            i16::MIN..=-2 => "error",
            -1 => "warn",
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
