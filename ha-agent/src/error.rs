use thiserror::Error;

/// Configuration error (§7): missing/unparsable bootstrap ini file is
/// fatal at startup. `main` turns this into a `process::exit`, never a
/// panic.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading bootstrap config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: ini::Error,
    },

    #[error("missing required key [{section}] {key} in {path}")]
    MissingKey {
        section: String,
        key: String,
        path: String,
    },
}

/// Everything that can abort a tick (§4.5, §7). Every variant here is a
/// transient-or-validation condition the scheduler logs and moves past —
/// nothing in this enum is fatal the way `ConfigError` is.
#[derive(Debug, Error)]
pub enum TickError {
    #[error("refreshing configuration from the store: {0}")]
    ConfigRefresh(#[source] ha_store::StoreError),
    #[error(transparent)]
    Refresher(#[from] ha_refresher::RefresherError),
    #[error(transparent)]
    Fixer(#[from] ha_fixer::FixerError),
    #[error(transparent)]
    Switcher(#[from] ha_switcher::SwitcherError),
}

pub type TickResult<T> = Result<T, TickError>;
