// src/logging.rs

//! Logging setup for `pipewatch` using `tracing` + `tracing-subscriber`.
//!
//! The filter comes from, in order:
//! 1. the `--log-level` CLI flag, applied to every target;
//! 2. the `PIPEWATCH_LOG` environment variable, which takes full
//!    `EnvFilter` directives (e.g. `"info,pipewatch::watch=debug"`);
//! 3. `info`.
//!
//! HTTP plumbing (`hyper`, `hyper_util`, `tower_http`) is capped at `warn`
//! unless a directive names it explicitly. Logs go to STDERR; stdout carries
//! the server address and `--dry-run` output.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::cli::LogLevel;

/// Environment variable consulted when no `--log-level` flag is given.
pub const LOG_ENV_VAR: &str = "PIPEWATCH_LOG";

const QUIET_TARGETS: [&str; 3] = ["hyper", "hyper_util", "tower_http"];

/// Initialise the global subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let directives = match cli_level {
        Some(lvl) => level_name(lvl).to_string(),
        None => std::env::var(LOG_ENV_VAR)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "info".to_string()),
    };
    let filter = build_filter(&directives)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing tracing subscriber: {e}"))
}

fn level_name(lvl: LogLevel) -> &'static str {
    match lvl {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

/// Parse `directives` and add a `warn` cap for noisy HTTP crates the user
/// did not mention.
fn build_filter(directives: &str) -> Result<EnvFilter> {
    let mut filter = EnvFilter::try_new(directives)
        .with_context(|| format!("invalid log filter '{directives}'"))?;
    for target in QUIET_TARGETS {
        if !directives.contains(target) {
            filter = filter.add_directive(format!("{target}=warn").parse()?);
        }
    }
    Ok(filter)
}
