use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use ha_proto::{Node, NodeRole, NodeStatus, NodeType, SwitchStatus};
use serde::{Deserialize, Deserializer, Serialize};

use crate::envelope::Envelope;

/// What actually gets JSON-encoded as a node's stored value. Mirrors
/// `ha_proto::Node` minus `created_at`/`updated_at`, which the wire format
/// documents as coming from store metadata rather than the payload (§3,
/// §6.1) — here, from the surrounding `Envelope`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodePayload {
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub role: NodeRole,
    pub ip: String,
    #[serde(deserialize_with = "deserialize_heartbeat_defensive")]
    pub heartbeat: chrono::DateTime<chrono::Utc>,
    pub status: NodeStatus,
    pub alarmed: bool,
    #[serde(default)]
    pub switch_status: Option<SwitchStatus>,
}

/// Duplicate source revisions disagree on whether `heartbeat` is an
/// RFC 3339 timestamp or a naive `datetime.utcnow().strftime` string with no
/// timezone. Try RFC 3339 first, then the naive format assumed UTC; a value
/// that parses as neither is treated as "never heartbeated" (epoch 0),
/// which makes the node immediately heartbeat-timeout-eligible rather than
/// failing the whole read.
fn deserialize_heartbeat_defensive<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(parse_heartbeat(&raw))
}

fn parse_heartbeat(raw: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Utc.from_utc_datetime(&naive);
    }
    Utc.timestamp_opt(0, 0).single().expect("epoch is always a valid timestamp")
}

impl NodePayload {
    pub fn from_node(node: &Node) -> Self {
        Self {
            name: node.name.clone(),
            node_type: node.node_type,
            role: node.role,
            ip: node.ip.clone(),
            heartbeat: node.heartbeat,
            status: node.status,
            alarmed: node.alarmed,
            switch_status: node.switch_status,
        }
    }
}

pub fn into_node(envelope: Envelope<NodePayload>) -> Node {
    Node {
        name: envelope.value.name,
        node_type: envelope.value.node_type,
        role: envelope.value.role,
        ip: envelope.value.ip,
        heartbeat: envelope.value.heartbeat,
        status: envelope.value.status,
        alarmed: envelope.value.alarmed,
        switch_status: envelope.value.switch_status,
        created_at: envelope.created_at,
        updated_at: envelope.updated_at,
    }
}
