//! Shared helpers for `pipectl` tests: config builders, a recording
//! cluster session and tracing setup.

pub mod builders;
pub mod fake_session;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

/// Upper bound for a single pipeline run in tests. Runs spawn real
/// `sh -c` processes, so this is looser than a pure in-memory timeout.
pub const RUN_TIMEOUT: Duration = Duration::from_secs(10);

static INIT: Once = Once::new();

/// Route `tracing` output through the test harness writer, filtered by
/// `RUST_LOG` (default `info`). Captured output shows up for failing tests.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Await `f`, panicking if it takes longer than [`RUN_TIMEOUT`].
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(RUN_TIMEOUT, f)
        .await
        .unwrap_or_else(|_| panic!("pipeline run exceeded {RUN_TIMEOUT:?}"))
}
