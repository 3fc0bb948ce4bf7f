//! Log subscriber setup.
//!
//! The subscriber is installed once at startup with a default level and
//! re-levelled after configuration loads. `RUST_LOG`, when set, overrides
//! both.

use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

static LOG_RELOAD_HANDLE: OnceLock<reload::Handle<EnvFilter, tracing_subscriber::Registry>> =
    OnceLock::new();

/// HTTP plumbing is chatty at debug; keep it at warn unless RUST_LOG says otherwise.
const QUIET_DEPENDENCIES: &str = "hyper=warn,hyper_util=warn,reqwest=warn";

fn level_filter(level: &str) -> EnvFilter {
    let level = if EnvFilter::try_new(level).is_ok() {
        level
    } else {
        "info"
    };
    EnvFilter::new(format!("{level},{QUIET_DEPENDENCIES}"))
}

pub fn init_tracing() {
    init_tracing_with_level("info");
}

pub fn init_tracing_with_level(level: &str) {
    let base_filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| level_filter(level));

    let (reload_layer, handle) = reload::Layer::new(base_filter);
    let _ = LOG_RELOAD_HANDLE.set(handle);

    let _ = tracing_subscriber::registry()
        .with(reload_layer)
        .with(fmt::layer().with_target(false))
        .try_init();
}

/// Re-level the subscriber from `logging.level`.
pub fn apply_logging_level(level: &str) {
    if std::env::var_os("RUST_LOG").is_some() {
        return;
    }
    let Some(handle) = LOG_RELOAD_HANDLE.get() else {
        return;
    };
    match handle.modify(|f| *f = level_filter(level)) {
        Ok(()) => tracing::debug!(level, "logging level applied"),
        Err(e) => tracing::warn!(error = %e, level, "failed to apply logging level"),
    }
}
