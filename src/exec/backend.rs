// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime talks to an `ExecutorBackend` instead of a raw mpsc sender, so
//! tests can swap in a fake that records jobs and answers with canned
//! `JobCompleted` events.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::engine::RuntimeEvent;
use crate::errors::{Error, Result};
use crate::pipeline::{Job, PipelineRegistry};

use super::executor_loop::spawn_executor;

/// Trait abstracting how dispatched jobs are executed.
pub trait ExecutorBackend: Send {
    /// Start `job`. Completion is reported later as a
    /// `RuntimeEvent::JobCompleted`, never through the returned future.
    fn dispatch(&mut self, job: Job) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Production backend: forwards jobs to the background executor loop, which
/// runs them against the [`PipelineRegistry`].
#[derive(Debug)]
pub struct PipelineExecutor {
    tx: mpsc::Sender<Job>,
}

impl PipelineExecutor {
    /// Spawns the background executor loop immediately.
    pub fn new(registry: Arc<PipelineRegistry>, runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        let tx = spawn_executor(registry, runtime_tx);
        Self { tx }
    }
}

impl ExecutorBackend for PipelineExecutor {
    fn dispatch(&mut self, job: Job) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.tx.clone();
        Box::pin(async move {
            tx.send(job).await.map_err(Error::from)?;
            Ok(())
        })
    }
}
