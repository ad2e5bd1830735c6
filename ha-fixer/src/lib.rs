//! The Fixer (§4.3): local remediation plus externally-visible, debounced
//! alerting. Restarts local services still in `restarting`, files
//! `service_down`/`service_timeout` issues for local failures, and files
//! `healthchecker_error`/`other_node_down` issues for dead peers — all
//! debounced through the `alarmed` flag on whichever record raised it.

mod issue_format;

use std::sync::Arc;

use chrono::Utc;
use ha_exec::{InitSystem, LivenessProbe};
use ha_proto::{service_mapping, Configuration, Node, NodeStatus, ServiceStatus};
use ha_sideeffects::IssueTracker;
use ha_store::{alarmed_timeout, heartbeat_overtime, HaStore, KvBackend, NodeUpdate, ServiceUpdate, StoreError};
use thiserror::Error;

pub use issue_format::{render, IssueContext, IssueKind};

#[derive(Debug, Error)]
pub enum FixerError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type FixerResult<T> = Result<T, FixerError>;

pub struct Fixer {
    init_system: Arc<dyn InitSystem>,
    probe: Arc<dyn LivenessProbe>,
    issues: Arc<dyn IssueTracker>,
}

impl Fixer {
    pub fn new(init_system: Arc<dyn InitSystem>, probe: Arc<dyn LivenessProbe>, issues: Arc<dyn IssueTracker>) -> Self {
        Self { init_system, probe, issues }
    }

    pub async fn run<B: KvBackend>(&self, store: &HaStore<B>, local_name: &str, config: &Configuration) -> FixerResult<()> {
        let local = store.get_node(local_name).await?;

        if local.status != NodeStatus::Maintaining {
            self.fix_local_services(store, &local, config).await?;
        }
        self.alert_on_dead_peers(store, &local, config).await?;
        Ok(())
    }

    async fn fix_local_services<B: KvBackend>(&self, store: &HaStore<B>, local: &Node, config: &Configuration) -> FixerResult<()> {
        let def = service_mapping(local.node_type, local.role);
        let now = Utc::now();

        for svc_name in def.necessary.iter().chain(def.unnecessary.iter()) {
            let service = store.get_service(&local.name, svc_name).await?;

            if service.status == ServiceStatus::Restarting {
                tracing::info!(node = %local.name, service = svc_name, "restarting service");
                if let Err(e) = self.init_system.restart(svc_name).await {
                    tracing::error!(node = %local.name, service = svc_name, error = %e, "restart failed");
                }
            }

            if service.status == ServiceStatus::Down {
                if !service.alarmed {
                    let (title, body) = render(&IssueContext {
                        issuer: local,
                        kind: IssueKind::ServiceDown,
                        affected_node: None,
                        affected_service: Some(&service),
                    });
                    self.post_issue(&title, &body).await;
                    store
                        .update_service(
                            &local.name,
                            svc_name,
                            ServiceUpdate { alarmed: Some(true), ..Default::default() },
                        )
                        .await?;
                } else if !service.is_necessary && alarmed_timeout(service.alarmed_at, now, config.unnecessary_service_switch_timeout_hour) {
                    let (title, body) = render(&IssueContext {
                        issuer: local,
                        kind: IssueKind::ServiceTimeout,
                        affected_node: None,
                        affected_service: Some(&service),
                    });
                    self.post_issue(&title, &body).await;
                }
            }
        }
        Ok(())
    }

    /// Includes the zookeeper node if present, per spec.md §4.3 ("including
    /// the zookeeper node if present"). Maintaining peers are skipped: an
    /// operator-acknowledged maintenance window shouldn't page anyone.
    async fn alert_on_dead_peers<B: KvBackend>(&self, store: &HaStore<B>, local: &Node, config: &Configuration) -> FixerResult<()> {
        let now = Utc::now();
        for peer in store.list_nodes().await? {
            if peer.name == local.name || peer.status == NodeStatus::Maintaining {
                continue;
            }
            if peer.alarmed {
                continue;
            }

            let reachable = self.probe.is_reachable(&peer.ip).await;
            let expired = heartbeat_overtime(peer.heartbeat, now, config.heartbeat_timeout_second);

            let kind = if reachable && expired {
                Some(IssueKind::HealthcheckerError)
            } else if !reachable && expired && peer.status == NodeStatus::Down {
                Some(IssueKind::OtherNodeDown)
            } else {
                None
            };

            if let Some(kind) = kind {
                let (title, body) = render(&IssueContext {
                    issuer: local,
                    kind,
                    affected_node: Some(&peer),
                    affected_service: None,
                });
                self.post_issue(&title, &body).await;
                store
                    .update_node(&peer.name, NodeUpdate { alarmed: Some(true), ..Default::default() })
                    .await?;
            }
        }
        Ok(())
    }

    async fn post_issue(&self, title: &str, body: &str) {
        if let Err(e) = self.issues.create_issue(title, body).await {
            tracing::error!(error = %e, title, "failed to post issue");
        }
    }
}
