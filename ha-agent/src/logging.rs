//! Per-tick log-level reload (§10): `/ha/configuration`'s `logging_level`
//! can change without a restart, so the agent tracks the last value it
//! applied and calls back into a `tracing_subscriber::reload::Handle`
//! whenever it changes, instead of re-reading `RUST_LOG` from the
//! environment every tick.

use std::sync::Mutex;

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::reload;

pub type FilterReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

/// Normalizes an operator-supplied level (e.g. "INFO", "debug") into the
/// directive `EnvFilter` expects for this binary's target.
pub fn filter_for_level(level: &str) -> EnvFilter {
    let normalized = level.trim().to_lowercase();
    let normalized = if normalized.is_empty() { "info".to_string() } else { normalized };
    EnvFilter::try_new(format!("ha_agent={normalized}"))
        .unwrap_or_else(|_| EnvFilter::new("ha_agent=info"))
}

/// Holds the reload handle installed at startup (`None` when running
/// without a live subscriber, e.g. in unit tests) and the last
/// `logging_level` applied, so a tick only reloads the filter when the
/// value actually changed.
pub struct LoggingReload {
    handle: Option<FilterReloadHandle>,
    last_level: Mutex<String>,
}

impl LoggingReload {
    pub fn new(handle: Option<FilterReloadHandle>, initial_level: &str) -> Self {
        Self {
            handle,
            last_level: Mutex::new(initial_level.to_string()),
        }
    }

    pub fn disabled() -> Self {
        Self::new(None, "info")
    }

    /// Applies `level` if it differs from the last one seen. Reload
    /// failures (the subscriber having gone away) are logged, never fatal.
    pub fn apply(&self, level: &str) {
        let mut last = self.last_level.lock().expect("logging reload mutex poisoned");
        if last.eq_ignore_ascii_case(level) {
            return;
        }
        if let Some(handle) = &self.handle {
            if let Err(e) = handle.reload(filter_for_level(level)) {
                tracing::warn!(error = %e, level, "failed to reload log filter");
                return;
            }
            tracing::info!(from = %*last, to = %level, "log level changed");
        }
        *last = level.to_string();
    }
}
