// src/watch/event_handler.rs

//! Turns one raw filesystem change into `FileChanged` events for the
//! categories that watch it.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::RuntimeEvent;
use crate::fs::FileSystem;
use crate::types::{EventKind, FileEvent};
use crate::watch::cache::FileCache;
use crate::watch::path_map::CanonicalPath;
use crate::watch::patterns::CategoryWatchProfile;

/// Shared state for routing watcher events.
#[derive(Debug, Clone)]
pub struct WatchContext {
    /// Canonical project root; event paths are made relative to it.
    pub root: PathBuf,
    pub profiles: Arc<Vec<CategoryWatchProfile>>,
    pub fs: Arc<dyn FileSystem>,
    /// Present when `skip_unchanged` is on.
    pub cache: Option<Arc<Mutex<FileCache>>>,
}

/// Convert `path` into a root-relative path with `/` separators.
///
/// A direct prefix strip is tried first. If that fails (symlinked temp dirs,
/// `/private/var` on macOS) the parent directory is canonicalized and the
/// strip retried; the parent still exists for removed files.
pub fn relative_path(fs: &dyn FileSystem, root: &Path, path: &Path) -> Option<CanonicalPath> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(CanonicalPath::from_path(rel));
    }

    let parent = path.parent()?;
    let name = path.file_name()?;
    let parent = fs.canonicalize(parent).ok()?;
    let root = fs.canonicalize(root).ok()?;
    parent
        .join(name)
        .strip_prefix(&root)
        .ok()
        .map(CanonicalPath::from_path)
}

/// Route one change to every matching category.
///
/// Returns false once the runtime channel is closed, telling the watcher
/// loop to stop.
pub async fn process_file_change(
    ctx: &WatchContext,
    kind: EventKind,
    path: &Path,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
) -> bool {
    let Some(rel) = relative_path(ctx.fs.as_ref(), &ctx.root, path) else {
        warn!("could not relativize path {:?} against root {:?}", path, ctx.root);
        return true;
    };
    if rel.is_empty() {
        return true;
    }
    let rel_str = rel.to_string();

    let matching = matching_profiles(ctx, kind, path, &rel_str);
    if matching.is_empty() {
        return true;
    }

    if !content_changed(ctx, kind, path).await {
        info!(path = %rel_str, "content unchanged; skipping event");
        return true;
    }

    for profile in matching {
        debug!(category = profile.name(), path = %rel_str, %kind, "watch match");
        let event = FileEvent::new(kind, rel.to_path_buf(), profile.name());
        if let Err(err) = runtime_tx.send(RuntimeEvent::FileChanged(event)).await {
            warn!("failed to send RuntimeEvent::FileChanged: {err}");
            return false;
        }
    }
    true
}

/// Profiles interested in `path`. An added directory also goes to every
/// category watching a file somewhere below it.
fn matching_profiles<'a>(
    ctx: &'a WatchContext,
    kind: EventKind,
    path: &Path,
    rel_str: &str,
) -> Vec<&'a CategoryWatchProfile> {
    let added_dir = kind == EventKind::Added && ctx.fs.is_dir(path);
    ctx.profiles
        .iter()
        .filter(|p| {
            if p.matches(rel_str) {
                return true;
            }
            if !added_dir {
                return false;
            }
            p.watches_below(ctx.fs.as_ref(), &ctx.root, path)
                .unwrap_or_else(|err| {
                    warn!(dir = ?path, error = %format!("{err:#}"), "failed to scan added directory");
                    false
                })
        })
        .collect()
}

/// With `skip_unchanged`, a `Changed` event whose content hash matches the
/// last one seen is dropped. Added files are recorded, removed ones
/// forgotten. Any hashing problem lets the event through.
async fn content_changed(ctx: &WatchContext, kind: EventKind, path: &Path) -> bool {
    let Some(cache) = &ctx.cache else {
        return true;
    };

    let cache = Arc::clone(cache);
    let fs = Arc::clone(&ctx.fs);
    let path = path.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let mut cache = match cache.lock() {
            Ok(guard) => guard,
            Err(_poisoned) => {
                warn!("file cache mutex poisoned; passing event through");
                return true;
            }
        };

        match kind {
            EventKind::Removed => {
                cache.invalidate(&path);
                true
            }
            EventKind::Added | EventKind::Changed => {
                if !fs.is_file(&path) {
                    return true;
                }
                match cache.observe(fs.as_ref(), &path) {
                    Ok(changed) => kind == EventKind::Added || changed,
                    Err(err) => {
                        warn!(file = ?path, error = %err, "failed to hash file; passing event through");
                        true
                    }
                }
            }
        }
    })
    .await
    .unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use crate::watch::patterns::SourceGlob;

    fn profile(name: &str, pattern: &str, verbatim: bool) -> CategoryWatchProfile {
        CategoryWatchProfile::new(name, SourceGlob::compile(&[pattern.to_string()]).unwrap(), verbatim)
    }

    fn ctx(fs: &MockFileSystem, skip_unchanged: bool) -> WatchContext {
        WatchContext {
            root: PathBuf::from("/proj"),
            profiles: Arc::new(vec![
                profile("style", "src/scss/**/*.scss", false),
                profile("fonts", "src/fonts/**/*", true),
            ]),
            fs: Arc::new(fs.clone()),
            cache: skip_unchanged.then(|| Arc::new(Mutex::new(FileCache::new()))),
        }
    }

    #[tokio::test]
    async fn matching_path_is_attributed_to_its_category() {
        let fs = MockFileSystem::new();
        let ctx = ctx(&fs, false);
        let (tx, mut rx) = mpsc::channel(8);

        assert!(process_file_change(&ctx, EventKind::Changed, Path::new("/proj/src/scss/main.scss"), &tx).await);
        assert!(process_file_change(&ctx, EventKind::Changed, Path::new("/proj/README.md"), &tx).await);
        drop(tx);

        let Some(RuntimeEvent::FileChanged(event)) = rx.recv().await else {
            panic!("expected a FileChanged event");
        };
        assert_eq!(event, FileEvent::new(EventKind::Changed, "src/scss/main.scss", "style"));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn unchanged_content_is_skipped_when_enabled() {
        let fs = MockFileSystem::new();
        fs.add_file("/proj/src/scss/main.scss", b"a{}");
        let ctx = ctx(&fs, true);
        let (tx, mut rx) = mpsc::channel(8);
        let path = Path::new("/proj/src/scss/main.scss");

        process_file_change(&ctx, EventKind::Changed, path, &tx).await;
        process_file_change(&ctx, EventKind::Changed, path, &tx).await;
        drop(tx);

        let mut count = 0;
        while rx.recv().await.is_some() {
            count += 1;
        }
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn added_directory_reaches_categories_watching_files_inside() {
        let fs = MockFileSystem::new();
        fs.add_file("/proj/src/scss/vendor/bootstrap/_grid.scss", b"");
        let ctx = ctx(&fs, false);
        let (tx, mut rx) = mpsc::channel(8);

        process_file_change(&ctx, EventKind::Added, Path::new("/proj/src/scss/vendor"), &tx).await;
        drop(tx);

        let Some(RuntimeEvent::FileChanged(event)) = rx.recv().await else {
            panic!("expected a FileChanged event");
        };
        assert_eq!(event, FileEvent::new(EventKind::Added, "src/scss/vendor", "style"));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn changed_directory_is_not_scanned() {
        let fs = MockFileSystem::new();
        fs.add_file("/proj/src/scss/vendor/_grid.scss", b"");
        let ctx = ctx(&fs, false);
        let (tx, mut rx) = mpsc::channel(8);

        process_file_change(&ctx, EventKind::Changed, Path::new("/proj/src/scss/vendor"), &tx).await;
        drop(tx);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn closed_runtime_stops_the_loop() {
        let fs = MockFileSystem::new();
        let ctx = ctx(&fs, false);
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let keep_going =
            process_file_change(&ctx, EventKind::Removed, Path::new("/proj/src/fonts/a.woff"), &tx).await;
        assert!(!keep_going);
    }
}
