//! Process-wide tracing setup, following the teacher's choice of
//! `tracing` + `tracing-subscriber` (env-filter) for observability.
//!
//! Kept deliberately thin: the enclosing process (out of scope per
//! spec.md §1) owns logging configuration beyond the default filter.

use tracing_subscriber::EnvFilter;

/// Initialize a global `tracing` subscriber reading `RUST_LOG`
/// (default: `info`). Safe to call once per process; a second call is a
/// no-op logged at `debug`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("tracing subscriber already initialized");
    }
}
