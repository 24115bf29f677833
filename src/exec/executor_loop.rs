// src/exec/executor_loop.rs

//! Background loop that runs dispatched jobs against the pipeline registry.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::engine::RuntimeEvent;
use crate::pipeline::{BuildResult, Job, JobTrigger, PipelineRegistry};

/// Spawn the background executor loop.
///
/// Each job runs in its own Tokio task and reports back with exactly one
/// `RuntimeEvent::JobCompleted`. The core never dispatches a second job for
/// a busy category; a job arriving for a category whose previous task is
/// still alive is logged, since that would mean two writers on one build
/// root.
pub fn spawn_executor(
    registry: Arc<PipelineRegistry>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> mpsc::Sender<Job> {
    let (tx, mut rx) = mpsc::channel::<Job>(32);

    tokio::spawn(async move {
        info!("executor loop started");

        let mut active: HashMap<String, JoinHandle<()>> = HashMap::new();

        while let Some(job) = rx.recv().await {
            handle_job(job, &mut active, &registry, &runtime_tx);
        }

        info!("executor loop finished (channel closed)");
    });

    tx
}

fn handle_job(
    job: Job,
    active: &mut HashMap<String, JoinHandle<()>>,
    registry: &Arc<PipelineRegistry>,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
) {
    let name = job.category().to_string();

    if let Some(existing) = active.get(&name) {
        if !existing.is_finished() {
            warn!(category = %name, "job dispatched while previous job for category still running");
        }
    }

    let registry = Arc::clone(registry);
    let rt_tx = runtime_tx.clone();
    let spawn_name = name.clone();

    let handle = tokio::spawn(async move {
        let result = run_job(&registry, &job).await;
        if let Err(err) = rt_tx.send(RuntimeEvent::JobCompleted { result }).await {
            debug!(category = %spawn_name, error = %err, "runtime gone; dropping job result");
        }
    });

    active.insert(name, handle);
}

/// Run one job, turning a panic inside the transform into a failed result so
/// the category never stays stuck in `Running`.
async fn run_job(registry: &Arc<PipelineRegistry>, job: &Job) -> BuildResult {
    let inner_registry = Arc::clone(registry);
    let inner_job = job.clone();
    match tokio::spawn(async move { inner_registry.run_job(&inner_job).await }).await {
        Ok(result) => result,
        Err(join_err) => {
            error!(category = job.category(), error = %join_err, "job task panicked");
            let trigger = match job {
                Job::Rebuild { .. } => JobTrigger::Rebuild,
                Job::Sync { .. } => JobTrigger::Sync(Vec::new()),
            };
            BuildResult::failure(job.category(), format!("job aborted: {join_err}"), trigger)
        }
    }
}
