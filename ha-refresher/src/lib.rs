//! The Refresher (§4.2): local truth only. Observes the local node's
//! services through the init-system, reconciles their stored records,
//! writes a heartbeat, and marks an unreachable peer `down` on timeout.
//! Never initiates a switch — that's the Switcher's job, always run after
//! this one in the same tick (§4.1, §5).

use std::sync::Arc;

use chrono::Utc;
use ha_exec::{InitSystem, LivenessProbe, ServiceState};
use ha_proto::{service_mapping, Configuration, Node, NodeStatus, ServiceStatus};
use ha_store::{
    alarmed_timeout, heartbeat_overtime, KvBackend, HaStore, NodeUpdate, ServiceUpdate, StoreError,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RefresherError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type RefresherResult<T> = Result<T, RefresherError>;

pub struct Refresher {
    init_system: Arc<dyn InitSystem>,
    probe: Arc<dyn LivenessProbe>,
}

impl Refresher {
    pub fn new(init_system: Arc<dyn InitSystem>, probe: Arc<dyn LivenessProbe>) -> Self {
        Self { init_system, probe }
    }

    /// Runs one Refresher pass for the node named `local_name`. Skips the
    /// local service loop entirely when that node is `maintaining` (I4 —
    /// excluded from all failover reasoning, and the Refresher is the only
    /// component that could otherwise "rediscover" it as down).
    pub async fn run<B: KvBackend>(
        &self,
        store: &HaStore<B>,
        local_name: &str,
        config: &Configuration,
    ) -> RefresherResult<()> {
        let local = store.get_node(local_name).await?;

        if local.status != NodeStatus::Maintaining {
            self.reconcile_local_services(store, &local, config).await?;
            self.write_heartbeat(store, &local, config).await?;
        } else {
            tracing::debug!(node = %local.name, "node is maintaining; refresher skips local loop");
        }

        self.mark_unreachable_peers_down(store, &local, config).await?;
        Ok(())
    }

    async fn reconcile_local_services<B: KvBackend>(
        &self,
        store: &HaStore<B>,
        local: &Node,
        config: &Configuration,
    ) -> RefresherResult<()> {
        let def = service_mapping(local.node_type, local.role);
        let max_restarts = config.service_restart_max_times;

        for svc_name in def.necessary.iter().chain(def.unnecessary.iter()) {
            let observed = self.init_system.status(svc_name).await.unwrap_or(ServiceState::Down);
            let service = store.get_service(&local.name, svc_name).await?;

            let update = match observed {
                ServiceState::Up => {
                    if service.status != ServiceStatus::Up && service.restarted_count < max_restarts {
                        Some(ServiceUpdate {
                            status: Some(ServiceStatus::Up),
                            restarted: Some(false),
                            restarted_count: Some(0),
                            alarmed: Some(false),
                        })
                    } else {
                        None
                    }
                }
                ServiceState::Down => {
                    if !service.restarted {
                        Some(ServiceUpdate {
                            status: Some(ServiceStatus::Restarting),
                            restarted: Some(true),
                            restarted_count: Some(0),
                            alarmed: None,
                        })
                    } else if service.restarted_count <= max_restarts {
                        Some(ServiceUpdate {
                            status: None,
                            restarted: None,
                            restarted_count: Some(service.restarted_count + 1),
                            alarmed: None,
                        })
                    } else {
                        Some(ServiceUpdate {
                            status: Some(ServiceStatus::Down),
                            restarted: None,
                            restarted_count: None,
                            alarmed: None,
                        })
                    }
                }
            };

            if let Some(update) = update {
                tracing::debug!(node = %local.name, service = svc_name, observed = ?observed, "reconciling service");
                store.update_service(&local.name, svc_name, update).await?;
            }
        }
        Ok(())
    }

    async fn write_heartbeat<B: KvBackend>(
        &self,
        store: &HaStore<B>,
        local: &Node,
        config: &Configuration,
    ) -> RefresherResult<()> {
        let now = Utc::now();
        let mut update = NodeUpdate {
            heartbeat: Some(now),
            ..Default::default()
        };

        if matches!(local.status, NodeStatus::Initializing | NodeStatus::Down) {
            update.status = Some(NodeStatus::Up);
        }

        if local.alarmed && self.qualifies_for_alarm_clear(store, local, config).await? {
            update.alarmed = Some(false);
        }

        store.update_node(&local.name, update).await?;
        Ok(())
    }

    /// Slave nodes always qualify. Masters qualify only when no
    /// unnecessary-service alarm on this node has exceeded the switch
    /// timeout — an aging unnecessary failure keeps the node's own alarm
    /// raised even after the underlying service reconciliation above.
    async fn qualifies_for_alarm_clear<B: KvBackend>(
        &self,
        store: &HaStore<B>,
        local: &Node,
        config: &Configuration,
    ) -> RefresherResult<bool> {
        use ha_proto::NodeRole;
        if local.role != NodeRole::Master {
            return Ok(true);
        }

        let def = service_mapping(local.node_type, local.role);
        for svc_name in def.unnecessary {
            let service = store.get_service(&local.name, svc_name).await?;
            if service.alarmed
                && alarmed_timeout(service.alarmed_at, Utc::now(), config.unnecessary_service_switch_timeout_hour)
            {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// For every node other than `local`: if it's not `maintaining`, isn't
    /// pingable, and its heartbeat has expired, and it's currently `up`,
    /// mark it `down`. No other peer-mutation happens here (§4.2).
    async fn mark_unreachable_peers_down<B: KvBackend>(
        &self,
        store: &HaStore<B>,
        local: &Node,
        config: &Configuration,
    ) -> RefresherResult<()> {
        let now = Utc::now();
        for peer in store.list_nodes().await? {
            if peer.name == local.name {
                continue;
            }
            if peer.status == NodeStatus::Maintaining || peer.status != NodeStatus::Up {
                continue;
            }
            let reachable = self.probe.is_reachable(&peer.ip).await;
            let expired = heartbeat_overtime(peer.heartbeat, now, config.heartbeat_timeout_second);
            if !reachable && expired {
                tracing::warn!(peer = %peer.name, "peer unreachable and heartbeat expired; marking down");
                store
                    .update_node(
                        &peer.name,
                        NodeUpdate {
                            status: Some(NodeStatus::Down),
                            ..Default::default()
                        },
                    )
                    .await?;
            }
        }
        Ok(())
    }
}
