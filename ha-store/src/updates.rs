use ha_proto::{NodeRole, NodeStatus, NodeType, ServiceStatus, SwitchStatus};

/// A partial update: only fields set to `Some` are applied. Replaces the
/// source's `obj.update(**kwargs)` dynamic-merge pattern with an explicit
/// record the store adapter diffs against the current value.
#[derive(Debug, Clone, Default)]
pub struct NodeUpdate {
    pub role: Option<NodeRole>,
    pub node_type: Option<NodeType>,
    pub ip: Option<String>,
    pub status: Option<NodeStatus>,
    pub alarmed: Option<bool>,
    /// `Some(None)` clears switch_status to null; `None` leaves it untouched.
    pub switch_status: Option<Option<SwitchStatus>>,
    /// Distinct from `status`: the source store offers a dedicated
    /// maintain/un-maintain affordance rather than letting callers write
    /// `status=maintaining` directly, because only this toggle resets
    /// `heartbeat` on clearing (§3).
    pub maintain: Option<bool>,
    pub heartbeat: Option<chrono::DateTime<chrono::Utc>>,
}

impl NodeUpdate {
    pub fn is_empty(&self) -> bool {
        self.role.is_none()
            && self.node_type.is_none()
            && self.ip.is_none()
            && self.status.is_none()
            && self.alarmed.is_none()
            && self.switch_status.is_none()
            && self.maintain.is_none()
            && self.heartbeat.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ServiceUpdate {
    pub status: Option<ServiceStatus>,
    pub restarted: Option<bool>,
    pub restarted_count: Option<u32>,
    pub alarmed: Option<bool>,
}
