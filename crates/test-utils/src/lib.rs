//! Shared helpers for pipewatch's integration tests.

pub mod builders;
pub mod fake_executor;

pub use builders::{CategoryConfigBuilder, ConfigFileBuilder};
pub use fake_executor::FakeExecutor;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Upper bound for any single awaited step in a test.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Install a test-captured tracing subscriber once per test binary.
///
/// Output only shows for failing tests (or with `-- --nocapture`). The
/// filter is read from `PIPEWATCH_LOG`, defaulting to `pipewatch=info`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env("PIPEWATCH_LOG")
            .unwrap_or_else(|_| EnvFilter::new("warn,pipewatch=info"));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Await `f`, panicking if it takes longer than [`TEST_TIMEOUT`].
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(TEST_TIMEOUT, f)
        .await
        .unwrap_or_else(|_| panic!("test step timed out after {TEST_TIMEOUT:?}"))
}
