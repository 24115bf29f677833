// src/pipeline/copy.rs

//! Verbatim copy for fonts and vendored third-party files.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::fs::FileSystem;
use crate::pipeline::{AssetCategory, FileOp};
use crate::pipeline::transform::{AssetTransform, TransformContext};
use crate::types::EventKind;
use crate::watch::path_map::{map, map_event};
use crate::watch::patterns::collect_matching_files;

/// Copies every file matching the category's source glob into the build
/// root, preserving the subpath below the source root.
#[derive(Debug, Clone, Default)]
pub struct VerbatimCopy;

impl AssetTransform for VerbatimCopy {
    fn run<'a>(
        &'a self,
        ctx: TransformContext<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<PathBuf>>> + Send + 'a>> {
        Box::pin(async move {
            let outputs = copy_tree(ctx.fs, ctx.project_root, ctx.category, &ctx.source_dir())?;
            debug!(category = %ctx.category.name, copied = outputs.len(), "verbatim copy finished");
            Ok(outputs)
        })
    }
}

/// Copy every file below `base` that matches the category's source glob onto
/// its mapped build path. Returns the written build paths, sorted.
fn copy_tree(
    fs: &dyn FileSystem,
    project_root: &Path,
    category: &AssetCategory,
    base: &Path,
) -> Result<Vec<PathBuf>> {
    let files = collect_matching_files(fs, project_root, base, &category.source)?;

    let mut outputs = Vec::with_capacity(files.len());
    for file in files {
        let rel = file.strip_prefix(project_root).unwrap_or(&file);
        let mapped = map(&rel.to_string_lossy(), &category.source_root, &category.build_root)?;
        let dest = project_root.join(mapped.to_path_buf());
        fs.copy_file(&file, &dest)?;
        outputs.push(dest);
    }
    Ok(outputs)
}

/// Result of applying one [`FileOp`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpOutcome {
    /// The build tree changed; carries the affected build paths.
    Applied(Vec<PathBuf>),
    /// Nothing to do (source vanished, target already gone, not mappable).
    Skipped,
}

/// Apply a single add/change/remove to the build tree.
///
/// - Added: copy into the mapped *directory* under the source file name. An
///   added directory (moved or created with its contents) has every matching
///   file below it copied to its mapped path.
/// - Changed: copy onto the mapped file path.
/// - Removed: delete exactly the mapped path.
///
/// Paths that cannot be mapped are logged and skipped.
pub fn apply_file_op(
    fs: &dyn FileSystem,
    project_root: &Path,
    category: &AssetCategory,
    op: &FileOp,
) -> Result<OpOutcome> {
    let target = match map_event(
        op.kind,
        &op.path,
        Path::new(&category.source_root),
        Path::new(&category.build_root),
    ) {
        Ok(t) => project_root.join(t),
        Err(err) => {
            warn!(category = %category.name, error = %err, "skipping file op");
            return Ok(OpOutcome::Skipped);
        }
    };
    let source = project_root.join(&op.path);

    if op.kind == EventKind::Added && fs.is_dir(&source) {
        let copied = copy_tree(fs, project_root, category, &source)?;
        debug!(category = %category.name, dir = ?source, copied = copied.len(), "copied added directory");
        if copied.is_empty() {
            return Ok(OpOutcome::Skipped);
        }
        return Ok(OpOutcome::Applied(copied));
    }

    match op.kind {
        EventKind::Added | EventKind::Changed => {
            if !fs.is_file(&source) {
                debug!(category = %category.name, path = ?source, "source is not a file; nothing to copy");
                return Ok(OpOutcome::Skipped);
            }
            let dest = if op.kind == EventKind::Added {
                let name = source
                    .file_name()
                    .with_context(|| format!("source {:?} has no file name", source))?;
                target.join(name)
            } else {
                target
            };
            fs.copy_file(&source, &dest)?;
            debug!(category = %category.name, from = ?source, to = ?dest, kind = %op.kind, "copied file");
            Ok(OpOutcome::Applied(vec![dest]))
        }
        EventKind::Removed => {
            if fs.is_file(&target) {
                fs.remove_file(&target)?;
            } else if fs.is_dir(&target) {
                fs.remove_dir_all(&target)?;
            } else {
                debug!(category = %category.name, path = ?target, "mapped path already gone");
                return Ok(OpOutcome::Skipped);
            }
            debug!(category = %category.name, path = ?target, "removed mapped path");
            Ok(OpOutcome::Applied(vec![target]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::fs::mock::MockFileSystem;
    use crate::watch::patterns::SourceGlob;

    fn vendor_category() -> AssetCategory {
        AssetCategory {
            name: "vendor-script".to_string(),
            source_root: "src/js/lib/".to_string(),
            build_root: "build/js/lib/".to_string(),
            source: SourceGlob::compile(&["src/js/lib/**/*.js".to_string()]).unwrap(),
            transform: Arc::new(VerbatimCopy),
            copy_verbatim: true,
            minify: None,
        }
    }

    fn op(kind: EventKind, path: &str) -> FileOp {
        FileOp {
            kind,
            path: PathBuf::from(path),
        }
    }

    #[test]
    fn added_file_lands_in_mapped_directory() {
        let fs = MockFileSystem::new();
        fs.add_file("./src/js/lib/jquery.js", b"jq");

        let out = apply_file_op(
            &fs,
            Path::new("."),
            &vendor_category(),
            &op(EventKind::Added, "src/js/lib/jquery.js"),
        )
        .unwrap();

        assert_eq!(out, OpOutcome::Applied(vec![PathBuf::from("./build/js/lib/jquery.js")]));
        assert_eq!(fs.contents("./build/js/lib/jquery.js").unwrap(), b"jq");
    }

    #[test]
    fn removed_deletes_only_the_mapped_file() {
        let fs = MockFileSystem::new();
        fs.add_file("./build/js/lib/jquery.js", b"jq");
        fs.add_file("./build/js/lib/lodash.js", b"lo");
        fs.add_file("./build/js/app.js", b"app");

        let out = apply_file_op(
            &fs,
            Path::new("."),
            &vendor_category(),
            &op(EventKind::Removed, "src/js/lib/jquery.js"),
        )
        .unwrap();

        assert_eq!(out, OpOutcome::Applied(vec![PathBuf::from("./build/js/lib/jquery.js")]));
        assert_eq!(
            fs.file_paths(),
            vec![
                PathBuf::from("./build/js/app.js"),
                PathBuf::from("./build/js/lib/lodash.js"),
            ]
        );
    }

    #[test]
    fn added_directory_copies_its_matching_files() {
        let fs = MockFileSystem::new();
        fs.add_file("./src/js/lib/plugins/slick.js", b"sl");
        fs.add_file("./src/js/lib/plugins/deep/carousel.js", b"ca");
        fs.add_file("./src/js/lib/plugins/LICENSE", b"mit");

        let out = apply_file_op(
            &fs,
            Path::new("."),
            &vendor_category(),
            &op(EventKind::Added, "src/js/lib/plugins"),
        )
        .unwrap();

        assert_eq!(
            out,
            OpOutcome::Applied(vec![
                PathBuf::from("./build/js/lib/plugins/deep/carousel.js"),
                PathBuf::from("./build/js/lib/plugins/slick.js"),
            ])
        );
        assert_eq!(fs.contents("./build/js/lib/plugins/deep/carousel.js").unwrap(), b"ca");
        assert!(fs.contents("./build/js/lib/plugins/LICENSE").is_none());
    }

    #[test]
    fn unmappable_path_is_skipped() {
        let fs = MockFileSystem::new();
        fs.add_file("./build/js/lib/jquery.js", b"jq");

        let out = apply_file_op(
            &fs,
            Path::new("."),
            &vendor_category(),
            &op(EventKind::Removed, "vendor/jquery.js"),
        )
        .unwrap();

        assert_eq!(out, OpOutcome::Skipped);
        assert_eq!(fs.file_paths(), vec![PathBuf::from("./build/js/lib/jquery.js")]);
    }

    #[tokio::test]
    async fn full_copy_preserves_subpaths() {
        let fs = MockFileSystem::new();
        fs.add_file("./src/js/lib/jquery.js", b"jq");
        fs.add_file("./src/js/lib/plugins/slick.js", b"sl");
        fs.add_file("./src/js/lib/README.md", b"md");

        let category = vendor_category();
        let ctx = TransformContext {
            category: &category,
            project_root: Path::new("."),
            fs: &fs,
        };
        let outputs = VerbatimCopy.run(ctx).await.unwrap();

        assert_eq!(
            outputs,
            vec![
                PathBuf::from("./build/js/lib/jquery.js"),
                PathBuf::from("./build/js/lib/plugins/slick.js"),
            ]
        );
        assert_eq!(fs.contents("./build/js/lib/plugins/slick.js").unwrap(), b"sl");
    }
}
