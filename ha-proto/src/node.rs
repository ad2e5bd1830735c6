use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The two control-plane tiers plus the auxiliary coordination node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Zuul,
    Nodepool,
    Zookeeper,
}

/// A node's position in the master/slave pair, or the zookeeper role.
///
/// Invariant I2: `NodeType::Zookeeper` and `NodeRole::Zookeeper` only ever
/// appear together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Master,
    Slave,
    Zookeeper,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Initializing,
    Up,
    Down,
    Maintaining,
}

/// A node's position in the failover handshake (§4.4). `null` in the store
/// is represented as `Option::None`, never as a fourth variant, so a
/// malformed stored value has nowhere to decode to but `None` (treated as
/// `null` per spec's closing note on the state diagram).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchStatus {
    Start,
    End,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub role: NodeRole,
    pub ip: String,
    pub heartbeat: DateTime<Utc>,
    pub status: NodeStatus,
    pub alarmed: bool,
    #[serde(default)]
    pub switch_status: Option<SwitchStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Node {
    /// Invariant I4: nodes under operator maintenance take no part in
    /// failover reasoning, on either side of the decision.
    pub fn excluded_from_failover(&self) -> bool {
        self.status == NodeStatus::Maintaining
    }
}
