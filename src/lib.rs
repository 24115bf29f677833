// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod pipeline;
pub mod server;
pub mod tasks;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::cli::{CliArgs, TaskName};
use crate::config::{load_and_validate, ConfigFile};
use crate::errors::Result;
use crate::fs::{FileSystem, RealFileSystem};
use crate::pipeline::PipelineRegistry;

/// High-level entry point used by `main.rs`. Returns the process exit code.
///
/// This wires together:
/// - config loading and validation
/// - the pipeline registry
/// - the requested task (build, production build, watch, clean)
pub async fn run(args: CliArgs) -> Result<i32> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let project_root = config_root_dir(&config_path);

    if args.dry_run {
        print_dry_run(&cfg, &project_root, args.task);
        return Ok(0);
    }

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let registry = || PipelineRegistry::from_config(&cfg, &project_root, Arc::clone(&fs)).map(Arc::new);

    let summary = match args.task {
        TaskName::Clean => {
            tasks::clean(fs.as_ref(), &project_root, &cfg.config_section().build_root)?;
            return Ok(0);
        }
        TaskName::Build => tasks::build(registry()?).await?,
        TaskName::BuildProduction => tasks::build_production(registry()?).await?,
        TaskName::Watch => {
            tasks::watch(&cfg, &project_root, registry()?).await?;
            return Ok(0);
        }
    };

    Ok(if summary.success() { 0 } else { 1 })
}

/// Figure out the project root all config paths are relative to.
///
/// - If the config path has a non-empty parent (e.g. "site/Pipewatch.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Pipewatch.toml" (parent = ""),
///   we fall back to the current working directory "."
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Simple dry-run output: print categories and server settings.
fn print_dry_run(cfg: &ConfigFile, project_root: &Path, task: TaskName) {
    println!("pipewatch dry-run ({task:?})");
    println!("  project root = {}", project_root.display());
    println!("  config.build_root = {}", cfg.config_section().build_root);
    println!("  config.transform_timeout = {:?}", cfg.transform_timeout());
    println!("  config.skip_unchanged = {}", cfg.config_section().skip_unchanged);
    println!();

    let server = cfg.server();
    println!("server:");
    println!("  mode = {:?}", server.mode);
    println!("  addr = {}", cfg.server_addr());
    match &server.proxy_target {
        Some(target) => println!("  proxy_target = {target}"),
        None => println!("  root = {}", cfg.static_root()),
    }
    println!();

    println!("categories ({}):", cfg.categories().len());
    for (name, c) in cfg.categories() {
        println!("  - {name}");
        println!("      source: {:?}", c.source);
        if let Some(watch) = &c.watch {
            println!("      watch: {:?}", watch);
        }
        println!("      {} -> {}", c.source_root, c.build_root);
        if c.copy_verbatim {
            println!("      copy_verbatim: true");
        }
        if let Some(cmd) = &c.cmd {
            println!("      cmd: {cmd}");
        }
        if let Some(minify) = &c.minify {
            println!("      minify: {} ({:?})", minify.cmd, minify.extensions);
        }
    }

    debug!("dry-run complete (no execution)");
}
