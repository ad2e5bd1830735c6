use crate::node::{NodeRole, NodeType};

/// The fixed set of services a (type, role) pair is seeded with at node
/// creation, split into the services whose downtime alone warrants a
/// failover (`necessary`) and those that merely age into an alert
/// (`unnecessary`). This is a configuration constant in the source system;
/// here it is compiled in rather than re-derived per call.
#[derive(Debug, Clone, Copy)]
pub struct ServiceDefinition {
    pub necessary: &'static [&'static str],
    pub unnecessary: &'static [&'static str],
}

pub fn service_mapping(node_type: NodeType, role: NodeRole) -> ServiceDefinition {
    use NodeRole::*;
    use NodeType::*;
    match (node_type, role) {
        (Zuul, Master) => ServiceDefinition {
            necessary: &[
                "zuul-scheduler",
                "zuul-executor",
                "zuul-web",
                "gearman",
                "mysql",
                "apache",
            ],
            unnecessary: &["zuul-merger", "zuul-fingergw", "zuul-timer-tasks"],
        },
        (Zuul, Slave) => ServiceDefinition {
            necessary: &[],
            unnecessary: &["mysql", "rsync"],
        },
        (Nodepool, Master) => ServiceDefinition {
            necessary: &["nodepool-launcher"],
            unnecessary: &["nodepool-timer-tasks", "nodepool-builder", "zookeeper"],
        },
        (Nodepool, Slave) => ServiceDefinition {
            necessary: &[],
            unnecessary: &["zookeeper", "rsync"],
        },
        (Zookeeper, Zookeeper) => ServiceDefinition {
            necessary: &[],
            unnecessary: &["zookeeper"],
        },
        // I2 rules out zookeeper-type with a non-zookeeper role and vice
        // versa; any other pairing reaching here is a caller bug, not a
        // data condition worth a Result.
        (node_type, role) => panic!(
            "invalid (type, role) pairing: {node_type:?}/{role:?} violates invariant I1/I2"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zuul_master_has_the_documented_necessary_set() {
        let def = service_mapping(NodeType::Zuul, NodeRole::Master);
        assert_eq!(
            def.necessary,
            &["zuul-scheduler", "zuul-executor", "zuul-web", "gearman", "mysql", "apache"]
        );
    }

    #[test]
    fn nodepool_slave_has_no_necessary_services() {
        let def = service_mapping(NodeType::Nodepool, NodeRole::Slave);
        assert!(def.necessary.is_empty());
        assert_eq!(def.unnecessary, &["zookeeper", "rsync"]);
    }

    #[test]
    fn zookeeper_node_only_runs_zookeeper() {
        let def = service_mapping(NodeType::Zookeeper, NodeRole::Zookeeper);
        assert!(def.necessary.is_empty());
        assert_eq!(def.unnecessary, &["zookeeper"]);
    }
}
