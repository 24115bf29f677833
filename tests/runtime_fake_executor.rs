// tests/runtime_fake_executor.rs

use std::error::Error;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

use pipewatch::engine::{CoreRuntime, Runtime, RuntimeEvent, RuntimeOptions};
use pipewatch::pipeline::{FileOp, Job};
use pipewatch::server::reload::ReloadNotifier;
use pipewatch::types::{EventKind, FileEvent};
use pipewatch_test_utils::{init_tracing, with_timeout, FakeExecutor};

type TestResult = Result<(), Box<dyn Error>>;

fn one_shot() -> RuntimeOptions {
    RuntimeOptions { exit_when_idle: true }
}

fn changed(path: &str, category: &str) -> RuntimeEvent {
    RuntimeEvent::FileChanged(FileEvent::new(EventKind::Changed, path, category))
}

#[tokio::test]
async fn burst_during_running_job_yields_exactly_one_follow_up() -> TestResult {
    init_tracing();

    let (tx, rx) = mpsc::channel(64);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor =
        FakeExecutor::new(tx.clone(), Arc::clone(&executed)).with_delay(Duration::from_millis(200));
    let core = CoreRuntime::new([("script".to_string(), false)], one_shot());
    let runtime = tokio::spawn(Runtime::new(core, rx, executor).run());

    for i in 0..5 {
        tx.send(changed(&format!("src/js/file{i}.js"), "script")).await?;
        sleep(Duration::from_millis(10)).await;
    }

    let summary = with_timeout(runtime).await??;
    assert!(summary.success());

    let jobs = executed.lock().unwrap().clone();
    assert_eq!(
        jobs,
        vec![
            Job::Rebuild { category: "script".to_string() },
            Job::Rebuild { category: "script".to_string() },
        ]
    );
    Ok(())
}

#[tokio::test]
async fn verbatim_burst_is_batched_into_one_sync() -> TestResult {
    init_tracing();

    let (tx, rx) = mpsc::channel(64);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor =
        FakeExecutor::new(tx.clone(), Arc::clone(&executed)).with_delay(Duration::from_millis(150));
    let core = CoreRuntime::new([("fonts".to_string(), true)], one_shot());
    let runtime = tokio::spawn(Runtime::new(core, rx, executor).run());

    tx.send(changed("src/fonts/a.woff", "fonts")).await?;
    sleep(Duration::from_millis(10)).await;
    tx.send(RuntimeEvent::FileChanged(FileEvent::new(EventKind::Added, "src/fonts/b.woff", "fonts")))
        .await?;
    tx.send(RuntimeEvent::FileChanged(FileEvent::new(EventKind::Removed, "src/fonts/c.woff", "fonts")))
        .await?;

    with_timeout(runtime).await??;

    let jobs = executed.lock().unwrap().clone();
    assert_eq!(jobs.len(), 2);
    let Job::Sync { ops, .. } = &jobs[1] else {
        panic!("expected a sync follow-up, got {:?}", jobs[1]);
    };
    assert_eq!(
        ops,
        &vec![
            FileOp { kind: EventKind::Added, path: "src/fonts/b.woff".into() },
            FileOp { kind: EventKind::Removed, path: "src/fonts/c.woff".into() },
        ]
    );
    Ok(())
}

#[tokio::test]
async fn failed_job_does_not_block_the_next_change() -> TestResult {
    init_tracing();

    let (tx, rx) = mpsc::channel(64);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(tx.clone(), Arc::clone(&executed))
        .with_delay(Duration::from_millis(20))
        .failing("style");
    let core = CoreRuntime::new(
        [("style".to_string(), false), ("script".to_string(), false)],
        RuntimeOptions::default(),
    );
    let notifier = ReloadNotifier::new();
    let mut signals = notifier.subscribe();
    let runtime = tokio::spawn(Runtime::new(core, rx, executor).with_notifier(notifier).run());

    tx.send(changed("src/css/main.scss", "style")).await?;
    sleep(Duration::from_millis(80)).await;
    tx.send(changed("src/css/main.scss", "style")).await?;
    sleep(Duration::from_millis(80)).await;
    tx.send(changed("src/js/app.js", "script")).await?;
    sleep(Duration::from_millis(80)).await;
    tx.send(RuntimeEvent::ShutdownRequested).await?;

    let summary = with_timeout(runtime).await??;
    assert_eq!(summary.failed_categories, vec!["style".to_string()]);
    assert_eq!(executed.lock().unwrap().len(), 3);

    // Only the successful script build reaches the browser.
    let signal = signals.try_recv()?;
    assert_eq!(signal.category, "script");
    assert!(signals.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn one_shot_build_runs_every_category_once() -> TestResult {
    init_tracing();

    let (tx, rx) = mpsc::channel(64);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(tx.clone(), Arc::clone(&executed)).failing("vendor-script");
    let core = CoreRuntime::new(
        [
            ("style".to_string(), false),
            ("script".to_string(), false),
            ("vendor-script".to_string(), true),
        ],
        one_shot(),
    );

    for category in ["style", "script", "vendor-script"] {
        tx.send(RuntimeEvent::BuildRequested { category: category.to_string() }).await?;
    }
    drop(tx);

    let summary = with_timeout(Runtime::new(core, rx, executor).run()).await?;
    assert!(!summary.success());
    assert_eq!(summary.failed_categories, vec!["vendor-script".to_string()]);

    let mut names: Vec<String> = executed
        .lock()
        .unwrap()
        .iter()
        .map(|j| j.category().to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["script", "style", "vendor-script"]);
    Ok(())
}
