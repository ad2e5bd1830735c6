use ha_proto::{Node, NodeType};

use crate::backend::KvBackend;
use crate::error::StoreResult;
use crate::store::HaStore;

/// The three nodes every component's `run()` needs in hand before it can
/// reason about anything: the local node, its opposite (same `type`,
/// different `name`, per the stricter pairing rule SPEC_FULL.md settles on),
/// and the zookeeper node if the cluster has one. Mirrors
/// `Action._get_oppo_and_zk_node` in the source, which every one of the
/// three scripts built on top of — collapsed here into one shared lookup
/// instead of three copies.
pub struct Topology {
    pub local: Node,
    pub oppo: Option<Node>,
    pub zk: Option<Node>,
}

impl Topology {
    /// Resolves topology for the node identified by `local_name` (the
    /// agent's own hostname).
    pub async fn resolve<B: KvBackend>(store: &HaStore<B>, local_name: &str) -> StoreResult<Self> {
        let local = store.get_node(local_name).await?;
        let mut oppo = None;
        let mut zk = None;
        for node in store.list_nodes().await? {
            if node.node_type == local.node_type && node.name != local.name {
                oppo = Some(node);
                continue;
            }
            if node.node_type == NodeType::Zookeeper {
                zk = Some(node);
            }
        }
        Ok(Self { local, oppo, zk })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryKvBackend;
    use ha_proto::NodeRole;

    #[tokio::test]
    async fn resolves_oppo_by_same_type_different_name() {
        let store = HaStore::new(MemoryKvBackend::new());
        store
            .create_node("rax-openlab-zuul", NodeRole::Master, NodeType::Zuul, "10.0.0.1")
            .await
            .unwrap();
        store
            .create_node("ovh-openlab-zuul", NodeRole::Slave, NodeType::Zuul, "10.0.0.2")
            .await
            .unwrap();
        store
            .create_node("rax-openlab-zk", NodeRole::Zookeeper, NodeType::Zookeeper, "10.0.0.3")
            .await
            .unwrap();

        let topo = Topology::resolve(&store, "rax-openlab-zuul").await.unwrap();
        assert_eq!(topo.oppo.unwrap().name, "ovh-openlab-zuul");
        assert_eq!(topo.zk.unwrap().name, "rax-openlab-zk");
    }

    #[tokio::test]
    async fn no_oppo_or_zk_when_cluster_is_incomplete() {
        let store = HaStore::new(MemoryKvBackend::new());
        store
            .create_node("rax-openlab-zuul", NodeRole::Master, NodeType::Zuul, "10.0.0.1")
            .await
            .unwrap();

        let topo = Topology::resolve(&store, "rax-openlab-zuul").await.unwrap();
        assert!(topo.oppo.is_none());
        assert!(topo.zk.is_none());
    }
}
