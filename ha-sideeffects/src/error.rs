use thiserror::Error;

/// External API error (§7): DNS, issue tracker, and webhook failures are all
/// logged with code+reason and leave state untouched — never retried within
/// the tick that raised them.
#[derive(Debug, Error)]
pub enum SideEffectError {
    #[error("{adapter} request to {url} failed: {source}")]
    Transport {
        adapter: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{adapter} returned HTTP {status} for {url}: {reason}")]
    Http {
        adapter: &'static str,
        url: String,
        status: u16,
        reason: String,
    },

    #[error("dns: {0}")]
    RecordNotFound(String),
}

pub type SideEffectResult<T> = Result<T, SideEffectError>;
