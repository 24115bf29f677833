// tests/one_shot_build.rs
#![cfg(unix)]

use std::error::Error;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use pipewatch::config::ConfigFile;
use pipewatch::fs::{FileSystem, RealFileSystem};
use pipewatch::pipeline::PipelineRegistry;
use pipewatch::tasks;
use pipewatch_test_utils::{init_tracing, CategoryConfigBuilder, ConfigFileBuilder};

type TestResult = Result<(), Box<dyn Error>>;

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn registry(cfg: &ConfigFile, root: &Path) -> Arc<PipelineRegistry> {
    let filesystem: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    Arc::new(PipelineRegistry::from_config(cfg, root, filesystem).unwrap())
}

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "src/scss/main.scss", "body { color: red; }");
    write(dir.path(), "src/js/app.js", "console.log( 'app' );");
    write(dir.path(), "src/fonts/a.woff", "font");
    dir
}

#[tokio::test]
async fn build_runs_every_category() -> TestResult {
    init_tracing();
    let dir = project();
    let cfg = ConfigFileBuilder::new()
        .with_category(
            "style",
            CategoryConfigBuilder::compiled("src/scss", "build/css", "cat {src}/main.scss > {build}/main.css")
                .build(),
        )
        .with_category(
            "script",
            CategoryConfigBuilder::compiled("src/js", "build/js", "cp \"$PIPEWATCH_SOURCE_ROOT/app.js\" {build}/app.js")
                .build(),
        )
        .with_category("fonts", CategoryConfigBuilder::verbatim("src/fonts", "build/fonts").build())
        .build();

    let summary = tasks::build(registry(&cfg, dir.path())).await?;
    assert!(summary.success(), "{:?}", summary.failed_categories);

    assert_eq!(fs::read_to_string(dir.path().join("build/css/main.css"))?, "body { color: red; }");
    assert_eq!(fs::read_to_string(dir.path().join("build/js/app.js"))?, "console.log( 'app' );");
    assert_eq!(fs::read_to_string(dir.path().join("build/fonts/a.woff"))?, "font");
    Ok(())
}

#[tokio::test]
async fn failing_category_fails_the_build_but_not_the_others() -> TestResult {
    init_tracing();
    let dir = project();
    let cfg = ConfigFileBuilder::new()
        .with_category(
            "style",
            CategoryConfigBuilder::compiled("src/scss", "build/css", "echo 'main.scss: Unexpected }' >&2; exit 2")
                .build(),
        )
        .with_category("fonts", CategoryConfigBuilder::verbatim("src/fonts", "build/fonts").build())
        .build();

    let summary = tasks::build(registry(&cfg, dir.path())).await?;
    assert_eq!(summary.failed_categories, vec!["style".to_string()]);
    assert!(dir.path().join("build/fonts/a.woff").is_file());
    Ok(())
}

#[tokio::test]
async fn production_build_minifies_matching_outputs() -> TestResult {
    init_tracing();
    let dir = project();
    let cfg = ConfigFileBuilder::new()
        .with_category(
            "script",
            CategoryConfigBuilder::compiled("src/js", "build/js", "cp {src}/app.js {build}/app.js")
                .minify("tr -d ' ' < {input} > {output}", &["js"])
                .build(),
        )
        .build();

    let summary = tasks::build_production(registry(&cfg, dir.path())).await?;
    assert!(summary.success(), "{:?}", summary.failed_categories);
    assert_eq!(fs::read_to_string(dir.path().join("build/js/app.js"))?, "console.log( 'app' );");
    assert_eq!(fs::read_to_string(dir.path().join("build/js/app.min.js"))?, "console.log('app');");
    Ok(())
}

#[tokio::test]
async fn production_build_skips_minify_after_failure() -> TestResult {
    init_tracing();
    let dir = project();
    let cfg = ConfigFileBuilder::new()
        .with_category(
            "script",
            CategoryConfigBuilder::compiled("src/js", "build/js", "cp {src}/app.js {build}/app.js")
                .minify("echo minified > {output}", &["js"])
                .build(),
        )
        .with_category(
            "style",
            CategoryConfigBuilder::compiled("src/scss", "build/css", "exit 1").build(),
        )
        .build();

    let summary = tasks::build_production(registry(&cfg, dir.path())).await?;
    assert_eq!(summary.failed_categories, vec!["style".to_string()]);
    assert!(dir.path().join("build/js/app.js").is_file());
    assert!(!dir.path().join("build/js/app.min.js").exists());
    Ok(())
}

#[tokio::test]
async fn clean_removes_the_build_root() -> TestResult {
    init_tracing();
    let dir = project();
    write(dir.path(), "build/css/main.css", "x");

    tasks::clean(&RealFileSystem, dir.path(), "build")?;
    assert!(!dir.path().join("build").exists());
    assert!(dir.path().join("src/scss/main.scss").is_file());

    tasks::clean(&RealFileSystem, dir.path(), "build")?;
    Ok(())
}
