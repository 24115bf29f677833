// src/engine/mod.rs

//! Orchestration engine for pipewatch.
//!
//! Every category runs at most one job at a time. Events arriving while a
//! category is busy are coalesced into a single pending slot and run as
//! exactly one follow-up job when the current one finishes.
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use crate::pipeline::BuildResult;
use crate::types::{CategoryName, FileEvent};

/// Runtime options used by both the core and the async shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeOptions {
    /// If true, exit the runtime once every category is idle with nothing
    /// pending (one-shot builds).
    pub exit_when_idle: bool,
}

/// Events flowing into the runtime from the watcher, the executor and
/// signal handlers.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A watched file matching a category was added, changed or removed.
    FileChanged(FileEvent),
    /// Rebuild a whole category (initial builds).
    BuildRequested { category: CategoryName },
    /// A dispatched job finished.
    JobCompleted { result: BuildResult },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod core;
pub mod event_handlers;
pub mod queue;
pub mod runtime;

pub use core::{CategoryState, CoreRuntime};
pub use event_handlers::{CoreCommand, CoreStep};
pub use queue::{PendingWork, Work};
pub use runtime::{RunSummary, Runtime};
