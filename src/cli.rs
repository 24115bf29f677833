// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `pipewatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "pipewatch",
    version,
    about = "Build front-end assets, or watch sources and live-reload the browser.",
    long_about = None
)]
pub struct CliArgs {
    /// Task to run.
    #[arg(value_enum, default_value = "build")]
    pub task: TaskName,

    /// Path to the config file (TOML).
    ///
    /// Default: `Pipewatch.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Pipewatch.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PIPEWATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print categories, but don't run anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Named tasks the orchestrator can resolve.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum TaskName {
    /// Run every category's transform once.
    Build,
    /// `build`, then minify compiled script/style outputs.
    #[value(name = "build:production")]
    BuildProduction,
    /// Serve the build tree and rebuild on source changes until Ctrl-C.
    Watch,
    /// Recursively delete the configured build root.
    Clean,
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
