//! # Structured Logging
//!
//! Environment-aware tracing bootstrap. Workers log with structured fields
//! (task ids, detail ids, states) so a stuck pipeline can be traced from
//! its persisted row backwards.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize the tracing subscriber once for the process. Honors
/// `RUST_LOG`, defaulting to `info` for this crate.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("hostpool_core=info"));

        // A subscriber may already be installed by an embedding process;
        // that is not an error.
        let _ = tracing_subscriber::registry()
            .with(fmt::layer().with_target(true))
            .with(filter)
            .try_init();
    });
}
