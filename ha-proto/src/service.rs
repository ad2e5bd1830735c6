use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Initializing,
    Up,
    Down,
    Restarting,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub node_name: String,
    pub is_necessary: bool,
    pub status: ServiceStatus,
    #[serde(default)]
    pub restarted: bool,
    #[serde(default)]
    pub restarted_at: Option<DateTime<Utc>>,
    /// Consecutive observed-down ticks since the last successful restart.
    /// Not part of spec.md's attribute list but required by its
    /// reconciliation table (§4.2), which compares a running count against
    /// `service_restart_max_times`.
    #[serde(default)]
    pub restarted_count: u32,
    #[serde(default)]
    pub alarmed: bool,
    #[serde(default)]
    pub alarmed_at: Option<DateTime<Utc>>,
}

impl Service {
    pub fn new(name: impl Into<String>, node_name: impl Into<String>, is_necessary: bool) -> Self {
        Self {
            name: name.into(),
            node_name: node_name.into(),
            is_necessary,
            status: ServiceStatus::Initializing,
            restarted: false,
            restarted_at: None,
            restarted_count: 0,
            alarmed: false,
            alarmed_at: None,
        }
    }
}
