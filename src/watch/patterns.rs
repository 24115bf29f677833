// src/watch/patterns.rs

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::config::ConfigFile;
use crate::fs::FileSystem;
use crate::types::CategoryName;
use crate::watch::path_map::CanonicalPath;

/// Split a pattern list into (include, exclude), stripping the `!` marker
/// from exclusions.
///
/// ```text
/// ["src/img/**/*", "!src/img/svg/**"] -> (["src/img/**/*"], ["src/img/svg/**"])
/// ```
pub fn split_negated(patterns: &[String]) -> (Vec<String>, Vec<String>) {
    let mut include = Vec::new();
    let mut exclude = Vec::new();
    for pat in patterns {
        let pat = pat.trim();
        match pat.strip_prefix('!') {
            Some(neg) => exclude.push(normalize_pattern(neg)),
            None => include.push(normalize_pattern(pat)),
        }
    }
    (include, exclude)
}

fn normalize_pattern(pat: &str) -> String {
    let pat = pat.replace('\\', "/");
    pat.trim_start_matches("./").to_string()
}

/// Leading path segments of a glob that contain no glob metacharacters.
///
/// `src/img/**/*.png` -> `src/img`; `src/js/app.js` -> `src/js/app.js`.
pub fn literal_prefix(pattern: &str) -> CanonicalPath {
    let literal: Vec<&str> = pattern
        .split(['/', '\\'])
        .take_while(|seg| !seg.contains(['*', '?', '[', '{']))
        .collect();
    CanonicalPath::parse(&literal.join("/"))
}

/// Compiled include/exclude glob pair.
///
/// Patterns are relative to the project root; callers pass relative paths
/// with forward slashes (e.g. `"src/js/app.js"`) into [`SourceGlob::matches`].
#[derive(Clone)]
pub struct SourceGlob {
    include: GlobSet,
    exclude: Option<GlobSet>,
}

impl fmt::Debug for SourceGlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceGlob")
            .field("include", &self.include.len())
            .field("exclude", &self.exclude.as_ref().map(GlobSet::len))
            .finish()
    }
}

impl SourceGlob {
    /// Compile a pattern list where `!`-prefixed entries are exclusions.
    pub fn compile(patterns: &[String]) -> Result<Self> {
        let (include, exclude) = split_negated(patterns);

        let include = build_globset(&include).context("building include globset")?;
        let exclude = if exclude.is_empty() {
            None
        } else {
            Some(build_globset(&exclude).context("building exclude globset")?)
        };

        Ok(Self { include, exclude })
    }

    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.include.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }
}

/// Build a GlobSet from simple string patterns.
fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// Compiled watch patterns for a single category.
#[derive(Clone)]
pub struct CategoryWatchProfile {
    name: CategoryName,
    watch: SourceGlob,
    copy_verbatim: bool,
}

impl fmt::Debug for CategoryWatchProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CategoryWatchProfile")
            .field("name", &self.name)
            .field("copy_verbatim", &self.copy_verbatim)
            .finish_non_exhaustive()
    }
}

impl CategoryWatchProfile {
    pub fn new(name: impl Into<CategoryName>, watch: SourceGlob, copy_verbatim: bool) -> Self {
        Self {
            name: name.into(),
            watch,
            copy_verbatim,
        }
    }

    /// Name of the category this profile belongs to.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn copy_verbatim(&self) -> bool {
        self.copy_verbatim
    }

    /// Returns true if this category is interested in the given path
    /// (relative to project root), e.g. `"src/scss/main.scss"`.
    pub fn matches(&self, rel_path: &str) -> bool {
        self.watch.matches(rel_path)
    }

    /// True if some file below `dir` matches this profile. Used for
    /// directories moved into the tree, whose own path rarely matches a
    /// file glob like `src/js/**/*.js`.
    pub fn watches_below(&self, fs: &dyn FileSystem, root: &Path, dir: &Path) -> Result<bool> {
        Ok(!collect_matching_files(fs, root, dir, &self.watch)?.is_empty())
    }
}

/// Build one compiled watch profile per category of a validated config.
pub fn build_profiles_from_config(cfg: &ConfigFile) -> Result<Vec<CategoryWatchProfile>> {
    cfg.categories()
        .iter()
        .map(|(name, c)| {
            let watch = SourceGlob::compile(c.effective_watch())
                .with_context(|| format!("building watch globset for category {name}"))?;
            Ok(CategoryWatchProfile::new(name.clone(), watch, c.copy_verbatim))
        })
        .collect()
}

/// Collect all files under `base` whose path relative to `root` matches
/// `glob`. Results are sorted.
///
/// `base` narrows the walk (usually a category's source root) and must be
/// inside `root`.
pub fn collect_matching_files(
    fs: &dyn FileSystem,
    root: &Path,
    base: &Path,
    glob: &SourceGlob,
) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !fs.is_dir(base) {
        return Ok(files);
    }
    let mut stack = vec![base.to_path_buf()];

    while let Some(dir) = stack.pop() {
        for path in fs.read_dir(&dir)? {
            if fs.is_dir(&path) {
                stack.push(path);
            } else if fs.is_file(&path) {
                if let Ok(rel) = path.strip_prefix(root) {
                    let rel_str = CanonicalPath::from_path(rel).to_string();
                    if glob.matches(&rel_str) {
                        files.push(path);
                    }
                }
            }
        }
    }

    files.sort();
    Ok(files)
}
