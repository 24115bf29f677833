// src/pipeline/minify.rs

//! Production minification pass.
//!
//! Runs after a successful build. For every category with a `minify` table,
//! each file directly inside its build root with a listed extension is fed to
//! the minify command, which writes `<name>.min.<ext>` next to it. Files that
//! are already `.min.<ext>` are left alone, so the pass can be repeated.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, info};

use crate::config::MinifyConfig;
use crate::fs::FileSystem;
use crate::pipeline::transform::{expand_placeholders, run_shell, shell_quote};
use crate::pipeline::{AssetCategory, BuildResult, JobTrigger, PipelineRegistry};

/// `(input, output)` pairs the minify pass would process for a category.
pub fn minify_targets(
    fs: &dyn FileSystem,
    build_dir: &Path,
    spec: &MinifyConfig,
) -> Result<Vec<(PathBuf, PathBuf)>> {
    if !fs.is_dir(build_dir) {
        return Ok(Vec::new());
    }

    let mut targets = Vec::new();
    for path in fs.read_dir(build_dir)? {
        if !fs.is_file(&path) {
            continue;
        }
        let (Some(stem), Some(ext)) = (
            path.file_stem().and_then(|s| s.to_str()),
            path.extension().and_then(|s| s.to_str()),
        ) else {
            continue;
        };
        if !spec.extensions.iter().any(|e| e.trim_start_matches('.') == ext) {
            continue;
        }
        if stem.ends_with(".min") {
            continue;
        }
        let output = path.with_file_name(format!("{stem}.min.{ext}"));
        targets.push((path, output));
    }
    targets.sort();
    Ok(targets)
}

async fn minify_category(registry: &PipelineRegistry, category: &AssetCategory, spec: &MinifyConfig) -> BuildResult {
    let build_dir = registry.project_root().join(&category.build_root);
    let targets = match minify_targets(registry.fs(), &build_dir, spec) {
        Ok(t) => t,
        Err(err) => return BuildResult::failure(&category.name, format!("{err:#}"), JobTrigger::Rebuild),
    };

    let mut outputs = Vec::with_capacity(targets.len());
    for (input, output) in targets {
        let input_str = input.to_string_lossy().into_owned();
        let output_str = output.to_string_lossy().into_owned();
        let (input_q, output_q) = (shell_quote(&input_str), shell_quote(&output_str));
        let cmd = expand_placeholders(&spec.cmd, &[("input", &*input_q), ("output", &*output_q)]);
        debug!(category = %category.name, input = %input_str, "minifying");

        let run = run_shell(&category.name, &cmd, registry.project_root(), &[]);
        match tokio::time::timeout(registry.timeout(), run).await {
            Ok(Ok(())) => outputs.push(output),
            Ok(Err(err)) => {
                return BuildResult::failure(
                    &category.name,
                    format!("minifying {input_str}: {err:#}"),
                    JobTrigger::Rebuild,
                );
            }
            Err(_elapsed) => {
                return BuildResult::failure(
                    &category.name,
                    format!("minifying {input_str} timed out after {:?}", registry.timeout()),
                    JobTrigger::Rebuild,
                );
            }
        }
    }

    info!(category = %category.name, files = outputs.len(), "minification finished");
    BuildResult::success(&category.name, outputs, JobTrigger::Rebuild)
}

/// Minify every category that has a `minify` table. Categories are processed
/// one after another; a failure in one does not stop the others.
pub async fn run_minify_pass(registry: &PipelineRegistry) -> Vec<BuildResult> {
    let mut results = Vec::new();
    for category in registry.categories() {
        if let Some(spec) = &category.minify {
            results.push(minify_category(registry, category, spec).await);
        }
    }
    results
}
