// src/engine/queue.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::debug;

use crate::pipeline::{FileOp, Job};
use crate::types::{CategoryName, EventKind};

/// Work requested for a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Work {
    /// Rebuild the whole category.
    Rebuild,
    /// Apply one per-file op (verbatim categories).
    Op(FileOp),
}

/// Work that arrived while a category's job was running.
///
/// This is a coalescing slot, not a queue: however many events arrive during
/// a run, draining it yields at most one follow-up [`Job`].
///
/// - Rebuild requests collapse into a single flag.
/// - Per-file ops are keyed by path; the latest kind for a path wins.
/// - A pending rebuild subsumes per-file ops (the full copy covers them).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum PendingWork {
    #[default]
    Empty,
    Rebuild,
    Ops(BTreeMap<PathBuf, EventKind>),
}

impl PendingWork {
    pub fn new() -> Self {
        Self::Empty
    }

    /// Returns true if nothing is pending.
    pub fn is_empty(&self) -> bool {
        matches!(self, PendingWork::Empty)
    }

    /// Record work that arrived while the category is busy.
    pub fn record(&mut self, category: &str, work: Work) {
        match (work, &mut *self) {
            (Work::Rebuild, slot) => {
                if let PendingWork::Ops(ops) = slot {
                    debug!(category, dropped_ops = ops.len(), "pending rebuild subsumes queued file ops");
                }
                *slot = PendingWork::Rebuild;
            }
            (Work::Op(op), PendingWork::Rebuild) => {
                debug!(category, path = ?op.path, "file op folded into pending rebuild");
            }
            (Work::Op(op), PendingWork::Ops(ops)) => {
                let replaced = ops.insert(op.path.clone(), op.kind);
                debug!(category, path = ?op.path, kind = %op.kind, ?replaced, "coalesced file op");
            }
            (Work::Op(op), slot @ PendingWork::Empty) => {
                debug!(category, path = ?op.path, kind = %op.kind, "queued first file op");
                *slot = PendingWork::Ops(BTreeMap::from([(op.path, op.kind)]));
            }
        }
    }

    /// Take everything pending as a single follow-up job.
    pub fn drain(&mut self, category: &CategoryName) -> Option<Job> {
        match std::mem::take(self) {
            PendingWork::Empty => None,
            PendingWork::Rebuild => Some(Job::Rebuild {
                category: category.clone(),
            }),
            PendingWork::Ops(ops) => Some(Job::Sync {
                category: category.clone(),
                ops: ops
                    .into_iter()
                    .map(|(path, kind)| FileOp { kind, path })
                    .collect(),
            }),
        }
    }
}

/// Turn a single piece of work into an immediate job.
pub fn job_for(category: &CategoryName, work: Work) -> Job {
    match work {
        Work::Rebuild => Job::Rebuild {
            category: category.clone(),
        },
        Work::Op(op) => Job::Sync {
            category: category.clone(),
            ops: vec![op],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(kind: EventKind, path: &str) -> Work {
        Work::Op(FileOp {
            kind,
            path: PathBuf::from(path),
        })
    }

    #[test]
    fn many_rebuilds_drain_to_one_job() {
        let mut pending = PendingWork::new();
        pending.record("style", Work::Rebuild);
        pending.record("style", Work::Rebuild);
        pending.record("style", Work::Rebuild);

        let name = "style".to_string();
        assert_eq!(pending.drain(&name), Some(Job::Rebuild { category: name.clone() }));
        assert!(pending.is_empty());
        assert_eq!(pending.drain(&name), None);
    }

    #[test]
    fn ops_coalesce_per_path_last_kind_wins() {
        let mut pending = PendingWork::new();
        pending.record("fonts", op(EventKind::Added, "src/fonts/a.woff"));
        pending.record("fonts", op(EventKind::Changed, "src/fonts/b.woff"));
        pending.record("fonts", op(EventKind::Removed, "src/fonts/a.woff"));

        let name = "fonts".to_string();
        let job = pending.drain(&name).unwrap();
        assert_eq!(
            job,
            Job::Sync {
                category: name,
                ops: vec![
                    FileOp { kind: EventKind::Removed, path: PathBuf::from("src/fonts/a.woff") },
                    FileOp { kind: EventKind::Changed, path: PathBuf::from("src/fonts/b.woff") },
                ],
            }
        );
    }

    #[test]
    fn rebuild_subsumes_ops_in_either_order() {
        let name = "fonts".to_string();

        let mut pending = PendingWork::new();
        pending.record("fonts", op(EventKind::Changed, "src/fonts/a.woff"));
        pending.record("fonts", Work::Rebuild);
        assert_eq!(pending.drain(&name), Some(Job::Rebuild { category: name.clone() }));

        let mut pending = PendingWork::new();
        pending.record("fonts", Work::Rebuild);
        pending.record("fonts", op(EventKind::Changed, "src/fonts/a.woff"));
        assert_eq!(pending.drain(&name), Some(Job::Rebuild { category: name.clone() }));
    }
}
