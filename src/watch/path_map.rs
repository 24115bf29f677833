// src/watch/path_map.rs

//! Mapping of source-tree event paths onto build-tree paths.
//!
//! Event paths from `notify` use OS-native separators while configured roots
//! are usually written with `/`. Both sides are parsed into a
//! [`CanonicalPath`] (a plain segment list) before comparison, so separator
//! style never influences the result.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::types::EventKind;

/// Separator-agnostic path representation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalPath {
    absolute: bool,
    segments: Vec<String>,
}

impl CanonicalPath {
    /// Parse a path string, accepting both `/` and `\` as separators.
    ///
    /// Empty and `.` segments are dropped; `..` is kept verbatim.
    pub fn parse(raw: &str) -> Self {
        let absolute = raw.starts_with('/') || raw.starts_with('\\');
        let segments = raw
            .split(['/', '\\'])
            .filter(|s| !s.is_empty() && *s != ".")
            .map(str::to_string)
            .collect();
        Self { absolute, segments }
    }

    pub fn from_path(path: &Path) -> Self {
        Self::parse(&path.to_string_lossy())
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// True if `prefix` matches the leading segments of `self`.
    pub fn starts_with(&self, prefix: &CanonicalPath) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }

    /// True if either path is a segment-wise prefix of the other.
    pub fn overlaps(&self, other: &CanonicalPath) -> bool {
        self.starts_with(other) || other.starts_with(self)
    }

    /// Parent path, or `None` for an empty path.
    pub fn parent(&self) -> Option<CanonicalPath> {
        if self.segments.is_empty() {
            return None;
        }
        let mut segments = self.segments.clone();
        segments.pop();
        Some(Self {
            absolute: self.absolute,
            segments,
        })
    }

    pub fn join(&self, segment: &str) -> CanonicalPath {
        let mut joined = self.clone();
        joined
            .segments
            .extend(CanonicalPath::parse(segment).segments);
        joined
    }

    /// Index of the rightmost occurrence of `needle` as a contiguous run of
    /// segments.
    fn rfind(&self, needle: &CanonicalPath) -> Option<usize> {
        let n = needle.segments.len();
        if n == 0 || n > self.segments.len() {
            return None;
        }
        (0..=self.segments.len() - n)
            .rev()
            .find(|&i| self.segments[i..i + n] == needle.segments[..])
    }

    /// Convert to an OS path (joined with the platform separator).
    pub fn to_path_buf(&self) -> PathBuf {
        let mut out = if self.absolute {
            PathBuf::from("/")
        } else {
            PathBuf::new()
        };
        for seg in &self.segments {
            out.push(seg);
        }
        out
    }
}

impl fmt::Display for CanonicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.absolute {
            f.write_str("/")?;
        }
        f.write_str(&self.segments.join("/"))
    }
}

/// The event path does not contain the configured source root.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("path '{path}' is not under source root '{source_root}'")]
pub struct NotMappable {
    pub path: String,
    pub source_root: String,
}

/// Replace the rightmost occurrence of `source_root` in `event_path` with
/// `build_root`, keeping everything before and after it.
pub fn map(
    event_path: &str,
    source_root: &str,
    build_root: &str,
) -> Result<CanonicalPath, NotMappable> {
    let event = CanonicalPath::parse(event_path);
    let src = CanonicalPath::parse(source_root);
    let build = CanonicalPath::parse(build_root);

    let Some(idx) = event.rfind(&src) else {
        return Err(NotMappable {
            path: event_path.to_string(),
            source_root: source_root.to_string(),
        });
    };

    let mut segments = Vec::with_capacity(event.segments.len() + build.segments.len());
    segments.extend_from_slice(&event.segments[..idx]);
    segments.extend_from_slice(&build.segments);
    segments.extend_from_slice(&event.segments[idx + src.segments.len()..]);

    Ok(CanonicalPath {
        absolute: if idx == 0 { event.absolute || build.absolute } else { event.absolute },
        segments,
    })
}

/// Map an event to its build-tree target.
///
/// Added events resolve to the *directory* that will receive the file (the
/// copy decides the final name); Changed and Removed resolve to the exact
/// file path.
pub fn map_event(
    kind: EventKind,
    event_path: &Path,
    source_root: &Path,
    build_root: &Path,
) -> Result<PathBuf, NotMappable> {
    let mapped = map(
        &event_path.to_string_lossy(),
        &source_root.to_string_lossy(),
        &build_root.to_string_lossy(),
    )?;

    let target = match kind {
        EventKind::Added => mapped.parent().unwrap_or(mapped),
        EventKind::Changed | EventKind::Removed => mapped,
    };
    Ok(target.to_path_buf())
}
