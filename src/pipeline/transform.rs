// src/pipeline/transform.rs

//! The asset transform seam and the shell-command implementation.
//!
//! Compiled categories (templates, scripts, styles, images, icons) delegate
//! all real work to an external tool. This crate only knows how to start it,
//! bound it with a timeout, and turn its exit status into a result.

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;

use anyhow::{anyhow, bail, Context, Result};
use tokio::process::Command;
use tracing::{debug, info};

use crate::fs::FileSystem;
use crate::pipeline::AssetCategory;

/// Everything a transform may look at while running.
#[derive(Clone, Copy)]
pub struct TransformContext<'a> {
    pub category: &'a AssetCategory,
    pub project_root: &'a Path,
    pub fs: &'a dyn FileSystem,
}

impl TransformContext<'_> {
    /// Absolute source directory of the category.
    pub fn source_dir(&self) -> PathBuf {
        self.project_root.join(&self.category.source_root)
    }

    /// Absolute build directory of the category.
    pub fn build_dir(&self) -> PathBuf {
        self.project_root.join(&self.category.build_root)
    }
}

/// Trait abstracting how a category turns sources into build output.
///
/// Implementations return the output files they produced. Errors are
/// reported back to the registry, which folds them into a failed
/// `BuildResult`; they never escape into the watch loop.
pub trait AssetTransform: Send + Sync + fmt::Debug {
    fn run<'a>(
        &'a self,
        ctx: TransformContext<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<PathBuf>>> + Send + 'a>>;
}

/// Runs a shell command for the whole category.
///
/// `{src}`, `{build}` and `{category}` in the command are expanded, shell
/// quoted, before execution; the same values are exported unquoted as
/// `PIPEWATCH_SOURCE_ROOT`, `PIPEWATCH_BUILD_ROOT` and `PIPEWATCH_CATEGORY`.
#[derive(Debug, Clone)]
pub struct CommandTransform {
    cmd: String,
}

impl CommandTransform {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }
}

impl AssetTransform for CommandTransform {
    fn run<'a>(
        &'a self,
        ctx: TransformContext<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<PathBuf>>> + Send + 'a>> {
        Box::pin(async move {
            let src = ctx.source_dir();
            let build = ctx.build_dir();
            ctx.fs.create_dir_all(&build)?;

            let src_str = src.to_string_lossy().into_owned();
            let build_str = build.to_string_lossy().into_owned();
            let (src_q, build_q) = (shell_quote(&src_str), shell_quote(&build_str));
            let name_q = shell_quote(&ctx.category.name);
            let cmd = expand_placeholders(
                &self.cmd,
                &[("src", &*src_q), ("build", &*build_q), ("category", &*name_q)],
            );

            run_shell(
                &ctx.category.name,
                &cmd,
                ctx.project_root,
                &[
                    ("PIPEWATCH_CATEGORY", ctx.category.name.as_str()),
                    ("PIPEWATCH_SOURCE_ROOT", src_str.as_str()),
                    ("PIPEWATCH_BUILD_ROOT", build_str.as_str()),
                ],
            )
            .await?;

            walk_files(ctx.fs, &build)
        })
    }
}

/// Replace every `{key}` in `template` with its value.
pub fn expand_placeholders(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{key}}}"), value)
    })
}

/// Characters that never need quoting for the platform shell.
#[cfg(windows)]
const SHELL_SAFE: &str = "/\\._-+,:@=";
#[cfg(not(windows))]
const SHELL_SAFE: &str = "/._-+,:@=";

/// Quote `value` so it stays a single word once pasted into a shell command.
///
/// `sh` gets single quotes (embedded `'` become `'\''`), `cmd` gets double
/// quotes. Plain values are returned untouched.
pub fn shell_quote(value: &str) -> Cow<'_, str> {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || SHELL_SAFE.contains(c));
    if plain {
        Cow::Borrowed(value)
    } else if cfg!(windows) {
        Cow::Owned(format!("\"{value}\""))
    } else {
        Cow::Owned(format!("'{}'", value.replace('\'', r"'\''")))
    }
}

/// Run `cmd` through the platform shell in `cwd`.
///
/// Stdout is logged at debug level. A non-zero exit becomes an error whose
/// message carries the tail of stderr, which is usually the compiler
/// diagnostic the user needs to see.
pub async fn run_shell(label: &str, cmd: &str, cwd: &Path, envs: &[(&str, &str)]) -> Result<()> {
    info!(category = %label, cmd = %cmd, "starting transform process");

    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };

    command
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for (key, value) in envs {
        command.env(key, value);
    }

    let output = command
        .output()
        .await
        .with_context(|| format!("spawning process for category '{label}'"))?;

    for line in String::from_utf8_lossy(&output.stdout).lines() {
        debug!(category = %label, "stdout: {}", line);
    }

    let code = output.status.code().unwrap_or(-1);
    info!(
        category = %label,
        exit_code = code,
        success = output.status.success(),
        "transform process exited"
    );

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let tail: Vec<&str> = stderr.lines().rev().take(20).collect();
    if tail.is_empty() {
        bail!("command exited with code {code}");
    }
    let tail: Vec<&str> = tail.into_iter().rev().collect();
    Err(anyhow!("command exited with code {code}: {}", tail.join("\n")))
}

/// All files below `dir`, sorted. A missing directory yields no files.
pub fn walk_files(fs: &dyn FileSystem, dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !fs.is_dir(dir) {
        return Ok(files);
    }
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for path in fs.read_dir(&current)? {
            if fs.is_dir(&path) {
                stack.push(path);
            } else {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}
