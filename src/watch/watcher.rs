// src/watch/watcher.rs

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind as NotifyKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::engine::RuntimeEvent;
use crate::fs::FileSystem;
use crate::types::EventKind;
use crate::watch::cache::FileCache;
use crate::watch::event_handler::{process_file_change, WatchContext};
use crate::watch::patterns::CategoryWatchProfile;

/// Keeps the underlying `RecommendedWatcher` alive. Dropping this handle
/// stops file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Translate a notify event into `(kind, path)` pairs.
///
/// Renames become a removal of the old name and an addition of the new one.
/// When the platform does not say which side of a rename a path is, the
/// path's current existence decides. Access events are ignored.
pub fn classify(event: &Event, exists: impl Fn(&Path) -> bool) -> Vec<(EventKind, PathBuf)> {
    let all = |kind: EventKind| -> Vec<(EventKind, PathBuf)> {
        event.paths.iter().map(|p| (kind, p.clone())).collect()
    };

    match &event.kind {
        NotifyKind::Create(_) => all(EventKind::Added),
        NotifyKind::Remove(_) => all(EventKind::Removed),
        NotifyKind::Modify(ModifyKind::Name(RenameMode::From)) => all(EventKind::Removed),
        NotifyKind::Modify(ModifyKind::Name(RenameMode::To)) => all(EventKind::Added),
        NotifyKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut out = Vec::new();
            if let Some(from) = event.paths.first() {
                out.push((EventKind::Removed, from.clone()));
            }
            if let Some(to) = event.paths.get(1) {
                out.push((EventKind::Added, to.clone()));
            }
            out
        }
        NotifyKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .map(|p| {
                let kind = if exists(p) { EventKind::Added } else { EventKind::Removed };
                (kind, p.clone())
            })
            .collect(),
        NotifyKind::Modify(_) | NotifyKind::Any => all(EventKind::Changed),
        NotifyKind::Access(_) | NotifyKind::Other => Vec::new(),
    }
}

/// Spawn a recursive filesystem watcher on `root` that sends
/// `RuntimeEvent::FileChanged` for every path a category watches.
///
/// - `profiles` is the compiled per-category watch glob set.
/// - `skip_unchanged` enables the content-hash filter for `Changed` events.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    profiles: Vec<CategoryWatchProfile>,
    fs: Arc<dyn FileSystem>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    skip_unchanged: bool,
) -> Result<WatcherHandle> {
    let root = root.into();
    let root = fs.canonicalize(&root).unwrap_or(root);

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    // Called synchronously on notify's thread.
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    eprintln!("pipewatch: failed to forward notify event: {err}");
                }
            }
            Err(err) => {
                eprintln!("pipewatch: file watch error: {err}");
            }
        },
        Config::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;

    info!(?root, categories = profiles.len(), skip_unchanged, "file watcher started");

    let ctx = WatchContext {
        root,
        profiles: Arc::new(profiles),
        fs,
        cache: skip_unchanged.then(|| Arc::new(Mutex::new(FileCache::new()))),
    };

    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            debug!(?event, "received notify event");

            for (kind, path) in classify(&event, |p| ctx.fs.exists(p)) {
                if !process_file_change(&ctx, kind, &path, &runtime_tx).await {
                    debug!("runtime closed; stopping watcher loop");
                    return;
                }
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle { _inner: watcher })
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind};

    fn event(kind: NotifyKind, paths: &[&str]) -> Event {
        let mut e = Event::new(kind);
        for p in paths {
            e = e.add_path(PathBuf::from(p));
        }
        e
    }

    #[test]
    fn maps_create_modify_remove() {
        let never = |_: &Path| false;
        assert_eq!(
            classify(&event(NotifyKind::Create(CreateKind::File), &["/p/a"]), never),
            vec![(EventKind::Added, PathBuf::from("/p/a"))]
        );
        assert_eq!(
            classify(
                &event(NotifyKind::Modify(ModifyKind::Data(DataChange::Content)), &["/p/a"]),
                never
            ),
            vec![(EventKind::Changed, PathBuf::from("/p/a"))]
        );
        assert_eq!(
            classify(&event(NotifyKind::Remove(RemoveKind::File), &["/p/a"]), never),
            vec![(EventKind::Removed, PathBuf::from("/p/a"))]
        );
    }

    #[test]
    fn rename_both_splits_into_remove_and_add() {
        let ev = event(
            NotifyKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/p/old.js", "/p/new.js"],
        );
        assert_eq!(
            classify(&ev, |_| true),
            vec![
                (EventKind::Removed, PathBuf::from("/p/old.js")),
                (EventKind::Added, PathBuf::from("/p/new.js")),
            ]
        );
    }

    #[test]
    fn ambiguous_rename_uses_existence() {
        let ev = event(NotifyKind::Modify(ModifyKind::Name(RenameMode::Any)), &["/p/here", "/p/gone"]);
        let out = classify(&ev, |p| p == Path::new("/p/here"));
        assert_eq!(
            out,
            vec![
                (EventKind::Added, PathBuf::from("/p/here")),
                (EventKind::Removed, PathBuf::from("/p/gone")),
            ]
        );
    }

    #[test]
    fn access_is_ignored() {
        let ev = event(NotifyKind::Access(notify::event::AccessKind::Any), &["/p/a"]);
        assert!(classify(&ev, |_| true).is_empty());
    }
}
