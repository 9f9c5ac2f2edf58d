//! Test log output
//!
//! Installs a `tracing` subscriber once per test binary. The filter comes
//! from `RUST_LOG` and defaults to `warn,infra_mongo=debug`.

use once_cell::sync::Lazy;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "warn,infra_mongo=debug";

static TRACING: Lazy<()> = Lazy::new(|| {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    // Another harness may already have installed a global subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_test_writer(),
        )
        .try_init();
});

/// Installs the test subscriber; later calls are no-ops
pub fn init_test_tracing() {
    Lazy::force(&TRACING);
}
