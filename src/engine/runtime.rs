// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::errors::Result;
use crate::exec::ExecutorBackend;
use crate::pipeline::Job;
use crate::server::reload::ReloadNotifier;
use crate::types::CategoryName;

use super::core::CoreRuntime;
use super::{CoreCommand, RuntimeEvent};

/// What the runtime saw by the time it stopped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Categories whose latest job failed.
    pub failed_categories: Vec<CategoryName>,
}

impl RunSummary {
    pub fn success(&self) -> bool {
        self.failed_categories.is_empty()
    }
}

/// Drives the per-category state machine in response to `RuntimeEvent`s and
/// delegates the actual work to an `ExecutorBackend`.
///
/// All semantics live in [`CoreRuntime`]; this struct only reads events,
/// dispatches jobs and forwards finished results to the reload notifier.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
    notifier: Option<ReloadNotifier>,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("notifier", &self.notifier.is_some())
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(core: CoreRuntime, event_rx: mpsc::Receiver<RuntimeEvent>, executor: E) -> Self {
        Self {
            core,
            event_rx,
            executor,
            notifier: None,
        }
    }

    /// Publish successful results to connected browsers.
    pub fn with_notifier(mut self, notifier: ReloadNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Main event loop. Returns once the core asks to stop or every event
    /// sender is gone.
    pub async fn run(mut self) -> Result<RunSummary> {
        info!("pipewatch runtime started");

        loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    break;
                }
            };

            debug!(?event, "runtime received event");

            let step = self.core.step(event);
            for command in step.commands {
                self.execute_command(command).await?;
            }

            if !step.keep_running {
                info!("core requested exit; stopping runtime");
                break;
            }
        }

        let summary = RunSummary {
            failed_categories: self.core.failed_categories(),
        };
        info!(failed = ?summary.failed_categories, "runtime exiting");
        Ok(summary)
    }

    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::Dispatch(job) => self.dispatch(job).await?,
            CoreCommand::Publish(result) => {
                if let Some(notifier) = &self.notifier {
                    notifier.notify(&result);
                }
            }
            CoreCommand::RequestExit => {
                // keep_running is already false; nothing else to do.
                info!("core issued RequestExit command");
            }
        }
        Ok(())
    }

    async fn dispatch(&mut self, job: Job) -> Result<()> {
        debug!(category = job.category(), ?job, "dispatching job");
        self.executor.dispatch(job).await
    }
}
