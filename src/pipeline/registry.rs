// src/pipeline/registry.rs

//! Rebuild pipeline registry.
//!
//! Owns every [`AssetCategory`] for the lifetime of the process and runs jobs
//! against them. Every failure (non-zero exit, timeout, I/O error) is folded
//! into a failed [`BuildResult`] so callers in the watch loop never have to
//! deal with errors themselves.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info, warn};

use crate::config::ConfigFile;
use crate::errors::{PipewatchError, Result};
use crate::fs::FileSystem;
use crate::pipeline::copy::{apply_file_op, OpOutcome};
use crate::pipeline::transform::{AssetTransform, CommandTransform, TransformContext};
use crate::pipeline::{AssetCategory, BuildResult, FileOp, Job, JobTrigger, VerbatimCopy};
use crate::types::EventKind;
use crate::watch::patterns::SourceGlob;

#[derive(Debug)]
pub struct PipelineRegistry {
    project_root: PathBuf,
    fs: Arc<dyn FileSystem>,
    timeout: Duration,
    categories: BTreeMap<String, AssetCategory>,
}

impl PipelineRegistry {
    pub fn new(project_root: impl Into<PathBuf>, fs: Arc<dyn FileSystem>, timeout: Duration) -> Self {
        Self {
            project_root: project_root.into(),
            fs,
            timeout,
            categories: BTreeMap::new(),
        }
    }

    /// Build the registry from a validated config.
    ///
    /// Compiled categories get a [`CommandTransform`]; verbatim ones a
    /// [`VerbatimCopy`].
    pub fn from_config(
        cfg: &ConfigFile,
        project_root: impl Into<PathBuf>,
        fs: Arc<dyn FileSystem>,
    ) -> Result<Self> {
        let mut registry = Self::new(project_root, fs, cfg.transform_timeout());

        for (name, c) in cfg.categories() {
            let source = SourceGlob::compile(&c.source)
                .with_context(|| format!("building source globset for category {name}"))?;
            let transform: Arc<dyn AssetTransform> = match (&c.cmd, c.copy_verbatim) {
                (_, true) => Arc::new(VerbatimCopy),
                (Some(cmd), false) => Arc::new(CommandTransform::new(cmd.clone())),
                (None, false) => {
                    return Err(PipewatchError::ConfigError(format!(
                        "category '{name}' has no cmd"
                    )));
                }
            };

            registry = registry.with_category(AssetCategory {
                name: name.clone(),
                source_root: c.source_root.clone(),
                build_root: c.build_root.clone(),
                source,
                transform,
                copy_verbatim: c.copy_verbatim,
                minify: c.minify.clone(),
            });
        }

        Ok(registry)
    }

    /// Register a category (replacing one with the same name).
    pub fn with_category(mut self, category: AssetCategory) -> Self {
        self.categories.insert(category.name.clone(), category);
        self
    }

    pub fn resolve(&self, name: &str) -> Option<&AssetCategory> {
        self.categories.get(name)
    }

    pub fn categories(&self) -> impl Iterator<Item = &AssetCategory> {
        self.categories.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    pub fn fs_arc(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run whatever a dispatched job asks for.
    pub async fn run_job(&self, job: &Job) -> BuildResult {
        match job {
            Job::Rebuild { category } => self.run_transform(category).await,
            Job::Sync { category, ops } => self.run_sync(category, ops).await,
        }
    }

    /// Full category rebuild through the category's transform.
    pub async fn run_transform(&self, name: &str) -> BuildResult {
        let Some(category) = self.resolve(name) else {
            return BuildResult::failure(name, PipewatchError::CategoryNotFound(name.to_string()).to_string(), JobTrigger::Rebuild);
        };

        let ctx = TransformContext {
            category,
            project_root: &self.project_root,
            fs: self.fs.as_ref(),
        };

        let result = match tokio::time::timeout(self.timeout, category.transform.run(ctx)).await {
            Ok(Ok(outputs)) => BuildResult::success(name, outputs, JobTrigger::Rebuild),
            Ok(Err(err)) => BuildResult::failure(name, format!("{err:#}"), JobTrigger::Rebuild),
            Err(_elapsed) => BuildResult::failure(
                name,
                format!("transform timed out after {:?}", self.timeout),
                JobTrigger::Rebuild,
            ),
        };

        log_result(&result);
        result
    }

    /// Copy exactly one changed file of a verbatim category.
    pub async fn run_verbatim_copy(&self, path: impl Into<PathBuf>, name: &str) -> BuildResult {
        let op = FileOp {
            kind: EventKind::Changed,
            path: path.into(),
        };
        self.run_sync(name, std::slice::from_ref(&op)).await
    }

    /// Apply a batch of per-file ops for a verbatim category.
    ///
    /// Every op is attempted; one failing file does not hold back the rest of
    /// the batch. The result's trigger lists the kinds of ops that actually
    /// changed the build tree, and a failed result names every op that
    /// failed.
    pub async fn run_sync(&self, name: &str, ops: &[FileOp]) -> BuildResult {
        let Some(category) = self.resolve(name) else {
            return BuildResult::failure(
                name,
                PipewatchError::CategoryNotFound(name.to_string()).to_string(),
                JobTrigger::Sync(Vec::new()),
            );
        };
        if !category.copy_verbatim {
            return BuildResult::failure(
                name,
                format!("category '{name}' is not a verbatim-copy category"),
                JobTrigger::Sync(Vec::new()),
            );
        }

        let work = async {
            let mut outputs = Vec::new();
            let mut applied = Vec::new();
            let mut errors = Vec::new();
            for op in ops {
                match apply_file_op(self.fs.as_ref(), &self.project_root, category, op) {
                    Ok(OpOutcome::Applied(paths)) => {
                        outputs.extend(paths);
                        applied.push(op.kind);
                    }
                    Ok(OpOutcome::Skipped) => {}
                    Err(err) => {
                        warn!(category = %name, path = ?op.path, kind = %op.kind, error = %format!("{err:#}"), "file op failed");
                        errors.push(format!("{} {:?}: {err:#}", op.kind, op.path));
                    }
                }
            }
            if errors.is_empty() {
                BuildResult::success(name, outputs, JobTrigger::Sync(applied))
            } else {
                let mut result = BuildResult::failure(name, errors.join("\n"), JobTrigger::Sync(applied));
                result.output_paths = outputs;
                result
            }
        };

        let result = match tokio::time::timeout(self.timeout, work).await {
            Ok(result) => result,
            Err(_elapsed) => BuildResult::failure(
                name,
                format!("file sync timed out after {:?}", self.timeout),
                JobTrigger::Sync(Vec::new()),
            ),
        };

        log_result(&result);
        result
    }
}

fn log_result(result: &BuildResult) {
    if result.succeeded {
        info!(
            category = %result.category,
            outputs = result.output_paths.len(),
            "build finished"
        );
    } else if let Some(err) = result.error() {
        error!(category = %result.category, error = %err, "build failed");
    } else {
        warn!(category = %result.category, "build failed without a message");
    }
}
