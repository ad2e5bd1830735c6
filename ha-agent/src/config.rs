//! Bootstrap configuration (§6.7, §12): the one thing every agent needs to
//! read before it can reach the coordination store at all. Everything else
//! tunable — `allow_switch`, timeouts, DNS/GitHub credentials — lives in
//! `/ha/configuration` and is re-read every tick; this file only gets the
//! agent as far as opening that store.

use std::path::Path;

use crate::error::ConfigError;

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_retries() -> usize {
    5
}

/// Parsed from an ini file, following the source deploy tool's
/// templated-placeholder file but resolved once at process start instead
/// of at deploy time.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub store_endpoint: String,
    pub connect_timeout_secs: u64,
    pub retries: usize,
    /// Overrides `hostname::get()` when the host's reported hostname
    /// doesn't match the node name recorded in the store (containers,
    /// renamed hosts).
    pub hostname_override: Option<String>,
}

impl BootstrapConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ini = ini::Ini::load_from_file(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let store_section = ini.section(Some("store"));
        let store_endpoint = store_section
            .and_then(|s| s.get("endpoint"))
            .ok_or_else(|| ConfigError::MissingKey {
                section: "store".to_string(),
                key: "endpoint".to_string(),
                path: path.display().to_string(),
            })?
            .to_string();

        let connect_timeout_secs = store_section
            .and_then(|s| s.get("connect_timeout_secs"))
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_connect_timeout_secs);
        let retries = store_section
            .and_then(|s| s.get("retries"))
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_retries);

        let hostname_override = ini
            .section(Some("agent"))
            .and_then(|s| s.get("hostname"))
            .map(|s| s.to_string());

        Ok(Self {
            store_endpoint,
            connect_timeout_secs,
            retries,
            hostname_override,
        })
    }

    /// The node name this agent identifies itself as — the override if
    /// set, otherwise the local hostname (§2: "each agent is aware of its
    /// own identity (hostname)").
    pub fn resolve_local_name(&self) -> String {
        self.hostname_override.clone().unwrap_or_else(|| {
            hostname::get()
                .map(|h| h.to_string_lossy().to_string())
                .unwrap_or_else(|_| "unknown".to_string())
        })
    }
}
