// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `taskstage`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "taskstage",
    version,
    about = "Run a dependency graph of shell tasks in parallel stages.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the plan file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Taskstage.toml")]
    pub plan: PathBuf,

    /// Validate the plan and print its stages without running anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the dependency graph in Graphviz DOT format and exit.
    #[arg(long)]
    pub dot: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TASKSTAGE_LOG` or `info` is used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

pub fn parse() -> CliArgs {
    CliArgs::parse()
}
