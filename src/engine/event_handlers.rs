// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::engine::core::{CategorySlot, CategoryState};
use crate::engine::queue::{job_for, PendingWork, Work};
use crate::engine::RuntimeOptions;
use crate::pipeline::{BuildResult, FileOp, Job};
use crate::types::{CategoryName, FileEvent};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Send this job to the executor.
    Dispatch(Job),
    /// Hand a finished result to the reload notifier.
    Publish(BuildResult),
    /// Request that the process exits (one-shot builds, once idle).
    RequestExit,
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    pub fn keep_going(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }
}

/// Compiled categories always rebuild whole; verbatim ones sync per file.
pub fn handle_file_event(slot: &mut CategorySlot, event: FileEvent) -> CoreStep {
    let work = if slot.copy_verbatim {
        Work::Op(FileOp {
            kind: event.kind,
            path: event.path,
        })
    } else {
        Work::Rebuild
    };
    submit(slot, event.category, work)
}

pub fn handle_build_request(slot: &mut CategorySlot, category: CategoryName) -> CoreStep {
    submit(slot, category, Work::Rebuild)
}

/// Start work right away when idle, otherwise fold it into the pending slot.
fn submit(slot: &mut CategorySlot, category: CategoryName, work: Work) -> CoreStep {
    match &mut slot.state {
        CategoryState::Idle => {
            slot.state = CategoryState::Running {
                pending: PendingWork::new(),
            };
            CoreStep::keep_going(vec![CoreCommand::Dispatch(job_for(&category, work))])
        }
        CategoryState::Running { pending } => {
            pending.record(&category, work);
            CoreStep::keep_going(Vec::new())
        }
    }
}

/// Handle a finished job.
///
/// The result is always published. If work piled up during the run, exactly
/// one follow-up job is dispatched; otherwise the category goes idle.
pub fn handle_job_completion(
    slots: &mut BTreeMap<CategoryName, CategorySlot>,
    failed: &mut BTreeSet<CategoryName>,
    options: &RuntimeOptions,
    result: BuildResult,
) -> CoreStep {
    let Some(slot) = slots.get_mut(&result.category) else {
        warn!(category = %result.category, "completion for unknown category ignored");
        return CoreStep::keep_going(Vec::new());
    };

    let follow_up = match &mut slot.state {
        CategoryState::Idle => {
            warn!(category = %result.category, "completion for idle category ignored");
            return CoreStep::keep_going(Vec::new());
        }
        CategoryState::Running { pending } => pending.drain(&result.category),
    };

    if result.succeeded {
        failed.remove(&result.category);
    } else {
        failed.insert(result.category.clone());
    }

    let mut commands = vec![CoreCommand::Publish(result)];
    match follow_up {
        Some(job) => {
            debug!(category = job.category(), "dispatching coalesced follow-up job");
            commands.push(CoreCommand::Dispatch(job));
        }
        None => slot.state = CategoryState::Idle,
    }

    let mut keep_running = true;
    if options.exit_when_idle && slots.values().all(CategorySlot::is_idle) {
        keep_running = false;
        commands.push(CoreCommand::RequestExit);
    }

    CoreStep {
        commands,
        keep_running,
    }
}
