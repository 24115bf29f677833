// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! The core consumes [`RuntimeEvent`]s and produces commands describing what
//! the IO shell should do next. It has no channels, no Tokio types and
//! performs no IO, so it can be unit tested event by event.

use std::collections::{BTreeMap, BTreeSet};

use tracing::warn;

use crate::engine::event_handlers::{
    handle_build_request, handle_file_event, handle_job_completion, CoreStep,
};
use crate::engine::queue::PendingWork;
use crate::engine::{RuntimeEvent, RuntimeOptions};
use crate::pipeline::PipelineRegistry;
use crate::types::CategoryName;

/// Per-category execution state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryState {
    Idle,
    /// A job is in flight; `pending` collects work that arrived meanwhile.
    Running { pending: PendingWork },
}

/// What the core knows about one category.
#[derive(Debug, Clone)]
pub struct CategorySlot {
    pub copy_verbatim: bool,
    pub state: CategoryState,
}

impl CategorySlot {
    pub fn new(copy_verbatim: bool) -> Self {
        Self {
            copy_verbatim,
            state: CategoryState::Idle,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, CategoryState::Idle)
    }
}

#[derive(Debug)]
pub struct CoreRuntime {
    slots: BTreeMap<CategoryName, CategorySlot>,
    /// Categories whose most recent job failed.
    failed: BTreeSet<CategoryName>,
    options: RuntimeOptions,
}

impl CoreRuntime {
    /// Build a core from `(category, copy_verbatim)` pairs.
    pub fn new<I>(categories: I, options: RuntimeOptions) -> Self
    where
        I: IntoIterator<Item = (CategoryName, bool)>,
    {
        let slots = categories
            .into_iter()
            .map(|(name, verbatim)| (name, CategorySlot::new(verbatim)))
            .collect();
        Self {
            slots,
            failed: BTreeSet::new(),
            options,
        }
    }

    pub fn from_registry(registry: &PipelineRegistry, options: RuntimeOptions) -> Self {
        Self::new(
            registry
                .categories()
                .map(|c| (c.name.clone(), c.copy_verbatim)),
            options,
        )
    }

    /// True when no category has a job in flight.
    pub fn is_idle(&self) -> bool {
        self.slots.values().all(CategorySlot::is_idle)
    }

    pub fn state_of(&self, category: &str) -> Option<&CategoryState> {
        self.slots.get(category).map(|s| &s.state)
    }

    /// Categories whose latest job failed, in name order.
    pub fn failed_categories(&self) -> Vec<CategoryName> {
        self.failed.iter().cloned().collect()
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::FileChanged(event) => match self.slots.get_mut(&event.category) {
                Some(slot) => handle_file_event(slot, event),
                None => {
                    warn!(category = %event.category, path = ?event.path, "event for unknown category ignored");
                    CoreStep::keep_going(Vec::new())
                }
            },
            RuntimeEvent::BuildRequested { category } => match self.slots.get_mut(&category) {
                Some(slot) => handle_build_request(slot, category),
                None => {
                    warn!(%category, "build requested for unknown category");
                    CoreStep::keep_going(Vec::new())
                }
            },
            RuntimeEvent::JobCompleted { result } => {
                handle_job_completion(&mut self.slots, &mut self.failed, &self.options, result)
            }
            RuntimeEvent::ShutdownRequested => CoreStep {
                commands: Vec::new(),
                keep_running: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::engine::CoreCommand;
    use crate::pipeline::{BuildResult, FileOp, Job, JobTrigger};
    use crate::types::{EventKind, FileEvent};

    fn core(exit_when_idle: bool) -> CoreRuntime {
        CoreRuntime::new(
            [("script".to_string(), false), ("fonts".to_string(), true)],
            RuntimeOptions { exit_when_idle },
        )
    }

    fn changed(category: &str, path: &str) -> RuntimeEvent {
        RuntimeEvent::FileChanged(FileEvent::new(EventKind::Changed, path, category))
    }

    fn done(category: &str, ok: bool) -> RuntimeEvent {
        let result = if ok {
            BuildResult::success(category, Vec::new(), JobTrigger::Rebuild)
        } else {
            BuildResult::failure(category, "boom", JobTrigger::Rebuild)
        };
        RuntimeEvent::JobCompleted { result }
    }

    fn dispatched(step: &CoreStep) -> Vec<Job> {
        step.commands
            .iter()
            .filter_map(|c| match c {
                CoreCommand::Dispatch(job) => Some(job.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn idle_category_dispatches_immediately() {
        let mut core = core(false);
        let step = core.step(changed("script", "src/js/app.js"));

        assert_eq!(
            dispatched(&step),
            vec![Job::Rebuild { category: "script".into() }]
        );
        assert!(matches!(core.state_of("script"), Some(CategoryState::Running { .. })));
    }

    #[test]
    fn burst_while_running_yields_one_follow_up() {
        let mut core = core(false);
        core.step(changed("script", "src/js/a.js"));
        for _ in 0..5 {
            let step = core.step(changed("script", "src/js/b.js"));
            assert!(dispatched(&step).is_empty());
        }

        let step = core.step(done("script", true));
        assert_eq!(
            dispatched(&step),
            vec![Job::Rebuild { category: "script".into() }]
        );

        let step = core.step(done("script", true));
        assert!(dispatched(&step).is_empty());
        assert_eq!(core.state_of("script"), Some(&CategoryState::Idle));
    }

    #[test]
    fn verbatim_events_become_sync_ops() {
        let mut core = core(false);
        let step = core.step(RuntimeEvent::FileChanged(FileEvent::new(
            EventKind::Added,
            "src/fonts/a.woff",
            "fonts",
        )));

        assert_eq!(
            dispatched(&step),
            vec![Job::Sync {
                category: "fonts".into(),
                ops: vec![FileOp {
                    kind: EventKind::Added,
                    path: PathBuf::from("src/fonts/a.woff"),
                }],
            }]
        );
    }

    #[test]
    fn failure_publishes_and_returns_to_idle() {
        let mut core = core(false);
        core.step(changed("script", "src/js/app.js"));
        let step = core.step(done("script", false));

        assert!(step.keep_running);
        assert!(step
            .commands
            .iter()
            .any(|c| matches!(c, CoreCommand::Publish(r) if !r.succeeded)));
        assert_eq!(core.state_of("script"), Some(&CategoryState::Idle));
        assert_eq!(core.failed_categories(), vec!["script".to_string()]);

        // The next event is processed normally.
        let step = core.step(changed("script", "src/js/app.js"));
        assert_eq!(dispatched(&step).len(), 1);
        core.step(done("script", true));
        assert!(core.failed_categories().is_empty());
    }

    #[test]
    fn categories_run_independently() {
        let mut core = core(false);
        let a = core.step(RuntimeEvent::BuildRequested { category: "script".into() });
        let b = core.step(RuntimeEvent::BuildRequested { category: "fonts".into() });
        assert_eq!(dispatched(&a).len(), 1);
        assert_eq!(dispatched(&b).len(), 1);
    }

    #[test]
    fn exit_when_idle_waits_for_every_category() {
        let mut core = core(true);
        core.step(RuntimeEvent::BuildRequested { category: "script".into() });
        core.step(RuntimeEvent::BuildRequested { category: "fonts".into() });

        let step = core.step(done("script", true));
        assert!(step.keep_running);

        let step = core.step(done("fonts", true));
        assert!(!step.keep_running);
        assert!(step.commands.iter().any(|c| matches!(c, CoreCommand::RequestExit)));
    }

    #[test]
    fn unknown_category_and_stray_completion_are_ignored() {
        let mut core = core(false);
        let step = core.step(changed("nope", "x"));
        assert!(step.commands.is_empty());

        let step = core.step(done("script", true));
        assert!(step.commands.is_empty());
        assert!(core.is_idle());
    }
}
