use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Canonical category name type used throughout the engine.
pub type CategoryName = String;

/// Kind of filesystem change reported by the watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    Added,
    Changed,
    Removed,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventKind::Added => "added",
            EventKind::Changed => "changed",
            EventKind::Removed => "removed",
        };
        f.write_str(s)
    }
}

/// A single filesystem change already attributed to a category.
///
/// Created by the watcher, consumed exactly once by the engine core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub kind: EventKind,
    pub path: PathBuf,
    pub category: CategoryName,
}

impl FileEvent {
    pub fn new(kind: EventKind, path: impl Into<PathBuf>, category: impl Into<CategoryName>) -> Self {
        Self {
            kind,
            path: path.into(),
            category: category.into(),
        }
    }
}

/// How the dev server exposes the build output.
///
/// - `Static`: serve the build root directly (with directory listing).
/// - `Proxy`: forward every request to an upstream application server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerMode {
    Static,
    Proxy,
}

impl Default for ServerMode {
    fn default() -> Self {
        ServerMode::Static
    }
}

/// Parse a duration string like `"500ms"`, `"3s"`, `"2m"` or `"1h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 60 * 60)),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, or h",
            unit
        )),
    }
}
