// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `maaflow`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "maaflow",
    version,
    about = "Run maa task flows on a daily schedule or on demand.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Maaflow.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Maaflow.toml")]
    pub config: String,

    /// Run this flow immediately after startup.
    #[arg(long, value_name = "FLOW")]
    pub run: Option<String>,

    /// With `--run`: exit once that flow has finished instead of staying
    /// resident for scheduled runs.
    #[arg(long, requires = "run")]
    pub once: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `MAAFLOW_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print flows and the commands they would run, but
    /// don't execute anything.
    #[arg(long)]
    pub dry_run: bool,
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

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
