use chrono::Utc;

use crate::node::Node;
use crate::service::Service;

/// Replaces class-name string-sniffing between nodes and services with a
/// small capability set. The Fixer and Switcher debounce alerts against
/// whichever of the two they're holding without branching on its kind.
pub trait Alarmable {
    /// A human-readable label for log lines and issue bodies.
    fn identify(&self) -> String;
    fn is_alarmed(&self) -> bool;
    /// Sets the debounce flag and, when raising it, its paired timestamp.
    fn set_alarmed(&mut self, alarmed: bool);
}

pub struct NodeAlarmable<'a>(pub &'a mut Node);

impl Alarmable for NodeAlarmable<'_> {
    fn identify(&self) -> String {
        format!("{} node {}", self.0.role_label(), self.0.name)
    }

    fn is_alarmed(&self) -> bool {
        self.0.alarmed
    }

    fn set_alarmed(&mut self, alarmed: bool) {
        self.0.alarmed = alarmed;
    }
}

pub struct ServiceAlarmable<'a>(pub &'a mut Service);

impl Alarmable for ServiceAlarmable<'_> {
    fn identify(&self) -> String {
        format!("service {} on {}", self.0.name, self.0.node_name)
    }

    fn is_alarmed(&self) -> bool {
        self.0.alarmed
    }

    fn set_alarmed(&mut self, alarmed: bool) {
        self.0.alarmed = alarmed;
        if alarmed {
            self.0.alarmed_at = Some(Utc::now());
        }
    }
}

impl Node {
    fn role_label(&self) -> &'static str {
        match self.role {
            crate::node::NodeRole::Master => "master",
            crate::node::NodeRole::Slave => "slave",
            crate::node::NodeRole::Zookeeper => "zookeeper",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeRole, NodeStatus, NodeType};
    use chrono::Utc;

    fn node() -> Node {
        Node {
            name: "rax-openlab-zuul".into(),
            node_type: NodeType::Zuul,
            role: NodeRole::Master,
            ip: "10.0.0.1".into(),
            heartbeat: Utc::now(),
            status: NodeStatus::Up,
            alarmed: false,
            switch_status: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn node_alarmable_sets_flag_without_timestamp() {
        let mut n = node();
        let mut a = NodeAlarmable(&mut n);
        a.set_alarmed(true);
        assert!(n.alarmed);
    }

    #[test]
    fn service_alarmable_stamps_alarmed_at() {
        let mut s = Service::new("zuul-web", "rax-openlab-zuul", true);
        let mut a = ServiceAlarmable(&mut s);
        assert!(!a.is_alarmed());
        a.set_alarmed(true);
        assert!(s.alarmed);
        assert!(s.alarmed_at.is_some());
    }
}
