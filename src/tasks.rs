// src/tasks.rs

//! The four named tasks: `build`, `build:production`, `watch` and `clean`.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::ConfigFile;
use crate::engine::{CoreRuntime, RunSummary, Runtime, RuntimeEvent, RuntimeOptions};
use crate::errors::Result;
use crate::exec::PipelineExecutor;
use crate::fs::FileSystem;
use crate::pipeline::minify::run_minify_pass;
use crate::pipeline::PipelineRegistry;
use crate::server::reload::ReloadNotifier;
use crate::server::{DevServer, ServerSettings};
use crate::watch::build_profiles_from_config;

/// Send one `BuildRequested` per category.
async fn seed_builds(registry: &PipelineRegistry, tx: &mpsc::Sender<RuntimeEvent>) -> Result<()> {
    for name in registry.names() {
        tx.send(RuntimeEvent::BuildRequested {
            category: name.to_string(),
        })
        .await
        .map_err(anyhow::Error::from)?;
    }
    Ok(())
}

/// Run every category once, concurrently, and wait for all of them.
pub async fn build(registry: Arc<PipelineRegistry>) -> Result<RunSummary> {
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let executor = PipelineExecutor::new(Arc::clone(&registry), rt_tx.clone());

    seed_builds(&registry, &rt_tx).await?;
    drop(rt_tx);

    let core = CoreRuntime::from_registry(&registry, RuntimeOptions { exit_when_idle: true });
    let summary = Runtime::new(core, rt_rx, executor).run().await?;

    if summary.success() {
        info!(categories = registry.names().count(), "build finished");
    } else {
        error!(failed = ?summary.failed_categories, "build failed");
    }
    Ok(summary)
}

/// `build`, then the minification pass. Minification is skipped when the
/// build failed.
pub async fn build_production(registry: Arc<PipelineRegistry>) -> Result<RunSummary> {
    let summary = build(Arc::clone(&registry)).await?;
    if !summary.success() {
        warn!("skipping minification because the build failed");
        return Ok(summary);
    }

    let failed_categories: Vec<String> = run_minify_pass(&registry)
        .await
        .into_iter()
        .filter(|r| !r.succeeded)
        .map(|r| {
            error!(
                category = %r.category,
                error = r.error_message.as_deref().unwrap_or(""),
                "minification failed"
            );
            r.category
        })
        .collect();

    Ok(RunSummary { failed_categories })
}

/// Serve the build tree, build everything once, then rebuild on change until
/// Ctrl-C.
pub async fn watch(cfg: &ConfigFile, project_root: &Path, registry: Arc<PipelineRegistry>) -> Result<RunSummary> {
    let notifier = ReloadNotifier::new();
    let server = DevServer::new(ServerSettings::from_config(cfg, project_root)?, notifier.clone());
    let addr = server.ensure_started().await?;
    println!("pipewatch: serving on http://{addr}");

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let executor = PipelineExecutor::new(Arc::clone(&registry), rt_tx.clone());

    let profiles = build_profiles_from_config(cfg)?;
    let _watcher_handle = crate::watch::spawn_watcher(
        project_root,
        profiles,
        Arc::clone(registry.fs_arc()),
        rt_tx.clone(),
        cfg.config_section().skip_unchanged,
    )?;

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    seed_builds(&registry, &rt_tx).await?;

    let core = CoreRuntime::from_registry(&registry, RuntimeOptions { exit_when_idle: false });
    Runtime::new(core, rt_rx, executor)
        .with_notifier(notifier)
        .run()
        .await
}

/// Recursively delete the build root. A missing build root is fine.
pub fn clean(fs: &dyn FileSystem, project_root: &Path, build_root: &str) -> Result<()> {
    let target = project_root.join(build_root);
    if fs.is_dir(&target) {
        fs.remove_dir_all(&target)?;
        info!(path = ?target, "removed build root");
    } else if fs.is_file(&target) {
        fs.remove_file(&target)?;
        info!(path = ?target, "removed build root file");
    } else {
        info!(path = ?target, "build root already absent");
    }
    Ok(())
}
