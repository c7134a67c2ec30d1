//! Logging setup with idbkit segment prefixes.
//!
//! Library code only emits `tracing` events. Swallowed cursor failures are
//! reported at `warn`, batch bookkeeping at `debug`; hosts that want to see
//! them install a subscriber, e.g. via [`init`].

/// Initialize tracing with idbkit defaults.
///
/// Sets up tracing-subscriber with:
/// - Environment filter (RUST_LOG)
/// - Compact format suitable for terminal output
#[cfg(feature = "subscriber")]
pub fn init() {
    init_with_filter("info");
}

/// Initialize tracing with a custom default filter.
///
/// Does nothing if a global subscriber is already installed.
#[cfg(feature = "subscriber")]
pub fn init_with_filter(default_filter: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

/// Segment prefixes for log messages.
pub mod prefix {
    /// Storage boundary operations
    pub const DB: &str = "⊔";
    /// Batch cursor walks
    pub const BATCH: &str = "꩜";
    /// Query layer
    pub const QUERY: &str = "⋈";
}
