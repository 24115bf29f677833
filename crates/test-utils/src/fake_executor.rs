use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use pipewatch::engine::RuntimeEvent;
use pipewatch::errors::Result;
use pipewatch::exec::ExecutorBackend;
use pipewatch::pipeline::{BuildResult, Job, JobTrigger};

/// A fake executor that:
/// - records every dispatched job
/// - "runs" each job for `delay` on its own task
/// - reports JobCompleted, failing for categories listed in `failing`.
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    executed: Arc<Mutex<Vec<Job>>>,
    delay: Duration,
    failing: HashSet<String>,
}

impl FakeExecutor {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>, executed: Arc<Mutex<Vec<Job>>>) -> Self {
        Self {
            runtime_tx,
            executed,
            delay: Duration::ZERO,
            failing: HashSet::new(),
        }
    }

    /// Simulated job duration.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Jobs for this category complete with a failure.
    pub fn failing(mut self, category: &str) -> Self {
        self.failing.insert(category.to_string());
        self
    }
}

fn result_for(job: &Job, fail: bool) -> BuildResult {
    let trigger = match job {
        Job::Rebuild { .. } => JobTrigger::Rebuild,
        Job::Sync { ops, .. } => JobTrigger::Sync(ops.iter().map(|op| op.kind).collect()),
    };
    if fail {
        BuildResult::failure(job.category(), "simulated transform failure", trigger)
    } else {
        BuildResult::success(job.category(), Vec::new(), trigger)
    }
}

impl ExecutorBackend for FakeExecutor {
    fn dispatch(&mut self, job: Job) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let delay = self.delay;
        let fail = self.failing.contains(job.category());
        self.executed.lock().unwrap().push(job.clone());

        Box::pin(async move {
            tokio::spawn(async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                let result = result_for(&job, fail);
                let _ = tx.send(RuntimeEvent::JobCompleted { result }).await;
            });
            Ok(())
        })
    }
}
