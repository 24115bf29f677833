// src/watch/cache.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::debug;

use crate::fs::FileSystem;
use crate::watch::hash::compute_file_hash;

/// Last-seen content hash per watched file.
///
/// Editors often emit a modify event on save even when nothing changed; with
/// `skip_unchanged` enabled the watcher consults this cache and drops such
/// events before they reach the engine.
#[derive(Debug, Default)]
pub struct FileCache {
    hashes: HashMap<PathBuf, String>,
}

impl FileCache {
    pub fn new() -> Self {
        Self {
            hashes: HashMap::new(),
        }
    }

    /// Hash `path` and remember it. Returns true if the content differs from
    /// the last observation (a file seen for the first time counts as
    /// changed).
    pub fn observe(&mut self, fs: &dyn FileSystem, path: &Path) -> Result<bool> {
        let hash = compute_file_hash(fs, path)?;
        match self.hashes.insert(path.to_path_buf(), hash.clone()) {
            Some(old) if old == hash => {
                debug!(?path, "content hash unchanged");
                Ok(false)
            }
            _ => Ok(true),
        }
    }

    /// Forget a file (e.g. after it was removed).
    pub fn invalidate(&mut self, path: &Path) {
        if self.hashes.remove(path).is_some() {
            debug!("invalidated cache for {:?}", path);
        }
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn resave_without_edit_is_unchanged() {
        let fs = MockFileSystem::new();
        fs.add_file("src/scss/main.scss", b"a{}");
        let path = Path::new("src/scss/main.scss");

        let mut cache = FileCache::new();
        assert!(cache.observe(&fs, path).unwrap());
        assert!(!cache.observe(&fs, path).unwrap());

        fs.add_file("src/scss/main.scss", b"a{b:c}");
        assert!(cache.observe(&fs, path).unwrap());
    }

    #[test]
    fn invalidate_forgets_file() {
        let fs = MockFileSystem::new();
        fs.add_file("x", b"1");
        let mut cache = FileCache::new();
        cache.observe(&fs, Path::new("x")).unwrap();
        cache.invalidate(Path::new("x"));
        assert!(cache.is_empty());
        assert!(cache.observe(&fs, Path::new("x")).unwrap());
    }
}
