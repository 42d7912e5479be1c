//! Logging Setup
//!
//! One-shot `tracing` subscriber initialization for embedding applications
//! and tests. Library code only emits events; installing a subscriber is the
//! host's decision.

use tracing_subscriber::prelude::*;

/// Initializes a stdout tracing subscriber with env-filter support.
///
/// Respects `RUST_LOG`; defaults to `info` when unset.
pub fn init() {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(cfg!(debug_assertions));

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    // Avoid panics if already initialized (tests, repeated embedder calls).
    let _ = tracing::subscriber::set_global_default(subscriber);
}
