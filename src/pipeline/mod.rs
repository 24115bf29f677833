// src/pipeline/mod.rs

//! Asset categories and the transforms that turn sources into build output.
//!
//! - [`transform`] defines the [`AssetTransform`] seam and the shell-command
//!   transform used by compiled categories.
//! - [`copy`] is the verbatim-copy transform plus single-file sync ops.
//! - [`registry`] owns every category for the lifetime of the process and
//!   runs jobs against them.
//! - [`minify`] is the production minification pass.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::MinifyConfig;
use crate::errors::PipewatchError;
use crate::types::{CategoryName, EventKind};
use crate::watch::patterns::SourceGlob;

pub mod copy;
pub mod minify;
pub mod registry;
pub mod transform;

pub use copy::VerbatimCopy;
pub use registry::PipelineRegistry;
pub use transform::{AssetTransform, CommandTransform, TransformContext};

/// A named class of assets sharing one source glob, build root and transform.
#[derive(Clone)]
pub struct AssetCategory {
    pub name: CategoryName,
    /// Source root as configured, relative to the project root.
    pub source_root: String,
    /// Build root as configured, relative to the project root.
    pub build_root: String,
    pub source: SourceGlob,
    pub transform: Arc<dyn AssetTransform>,
    pub copy_verbatim: bool,
    pub minify: Option<MinifyConfig>,
}

impl fmt::Debug for AssetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetCategory")
            .field("name", &self.name)
            .field("source_root", &self.source_root)
            .field("build_root", &self.build_root)
            .field("copy_verbatim", &self.copy_verbatim)
            .field("transform", &self.transform)
            .finish_non_exhaustive()
    }
}

/// One per-file operation of a verbatim sync job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOp {
    pub kind: EventKind,
    /// Path relative to the project root.
    pub path: PathBuf,
}

/// Unit of work dispatched to the executor for one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    /// Run the category's transform over its full source set.
    Rebuild { category: CategoryName },
    /// Apply per-file copy/delete ops (verbatim categories only).
    Sync {
        category: CategoryName,
        ops: Vec<FileOp>,
    },
}

impl Job {
    pub fn category(&self) -> &str {
        match self {
            Job::Rebuild { category } | Job::Sync { category, .. } => category,
        }
    }
}

/// What caused a [`BuildResult`]; the reload notifier keys off this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobTrigger {
    Rebuild,
    /// Kinds of the sync ops that were actually applied.
    Sync(Vec<EventKind>),
}

/// Outcome of one transform or sync invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
    pub category: CategoryName,
    pub output_paths: Vec<PathBuf>,
    pub succeeded: bool,
    pub error_message: Option<String>,
    pub trigger: JobTrigger,
}

impl BuildResult {
    pub fn success(
        category: impl Into<CategoryName>,
        output_paths: Vec<PathBuf>,
        trigger: JobTrigger,
    ) -> Self {
        Self {
            category: category.into(),
            output_paths,
            succeeded: true,
            error_message: None,
            trigger,
        }
    }

    pub fn failure(
        category: impl Into<CategoryName>,
        message: impl Into<String>,
        trigger: JobTrigger,
    ) -> Self {
        Self {
            category: category.into(),
            output_paths: Vec::new(),
            succeeded: false,
            error_message: Some(message.into()),
            trigger,
        }
    }

    /// The failure as a crate error; `None` for successful results.
    pub fn error(&self) -> Option<PipewatchError> {
        let message = self.error_message.as_ref()?;
        Some(PipewatchError::TransformFailure {
            category: self.category.clone(),
            message: message.clone(),
        })
    }
}
