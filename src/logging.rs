//! # Structured Logging Module
//!
//! Environment-aware `tracing` initialization for binaries and tests that
//! embed the dispatch core. Library code only emits spans and events; calling
//! [`init_logging`] is optional and host applications that already install a
//! global subscriber can skip it entirely.

use std::sync::OnceLock;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize console logging with an environment-driven filter.
///
/// The filter is read from `DISPATCH_LOG` (falling back to `RUST_LOG`, then
/// to `info`). Safe to call more than once and safe to call when a global
/// subscriber is already installed.
pub fn init_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = std::env::var("DISPATCH_LOG")
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| "info".to_string());

        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_filter(EnvFilter::new(filter)),
        );

        // A host application may have installed its own subscriber already;
        // that is not an error.
        if subscriber.try_init().is_err() {
            tracing::debug!("global tracing subscriber already initialized");
        }
    });
}
