//! The Switcher (§4.4): the failover handshake itself. Decides whether a
//! switch is needed, proposes it, executes the promote/demote pair once the
//! pair has agreed, and clears the handshake flag once both sides land.
//! Runs last in a tick, after the Refresher and the Fixer (§4.1, §5) — by
//! the time it runs, both the local service truth and this tick's alerting
//! are already settled.

mod machine;

use std::sync::Arc;

use chrono::Utc;
use ha_exec::{InitSystem, LivenessProbe, TIMER_PSEUDO_SERVICES};
use ha_fixer::{render, IssueContext, IssueKind};
use ha_proto::{service_mapping, Configuration, Node, NodeRole, NodeType, ServiceStatus, SwitchStatus};
use ha_sideeffects::{DnsClient, IssueTracker, WebhookRotator};
use ha_store::{heartbeat_overtime, HaStore, KvBackend, NodeUpdate, StoreError, Topology};
use thiserror::Error;

use machine::{can_start, is_end, not_switching, pair};

#[derive(Debug, Error)]
pub enum SwitcherError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type SwitcherResult<T> = Result<T, SwitcherError>;

pub struct Switcher {
    init_system: Arc<dyn InitSystem>,
    probe: Arc<dyn LivenessProbe>,
    webhook: Arc<dyn WebhookRotator>,
    issues: Arc<dyn IssueTracker>,
}

impl Switcher {
    pub fn new(
        init_system: Arc<dyn InitSystem>,
        probe: Arc<dyn LivenessProbe>,
        webhook: Arc<dyn WebhookRotator>,
        issues: Arc<dyn IssueTracker>,
    ) -> Self {
        Self { init_system, probe, webhook, issues }
    }

    pub async fn run<B: KvBackend>(&self, store: &HaStore<B>, local_name: &str, config: &Configuration) -> SwitcherResult<()> {
        if !config.allow_switch {
            return Ok(());
        }

        let topo = Topology::resolve(store, local_name).await?;
        if topo.local.node_type == NodeType::Zookeeper {
            return Ok(());
        }

        self.propose(store, &topo.local, topo.oppo.as_ref(), config).await?;

        // Re-fetch once, after propose, so execute sees this call's own
        // self-proposal (and any surrogate write made on the peer's
        // behalf). terminate deliberately reuses this same snapshot rather
        // than re-fetching again after execute: execute's writes land in
        // the store immediately, but a node only ever drains its own
        // `end` back to null on a *later* call that observes it — never
        // inline within the call that produced it. Without this, a single
        // promote/demote would race straight through to null in one tick
        // instead of parking at `end` for the pair to observe (§4.4.5).
        let local = store.get_node(local_name).await?;
        let oppo = match &topo.oppo {
            Some(o) => Some(store.get_node(&o.name).await?),
            None => None,
        };
        self.execute(store, &local, oppo.as_ref(), config).await?;
        self.terminate(store, &local, oppo.as_ref(), config).await?;

        Ok(())
    }

    /// §4.4.2: self-propose when nothing is mid-flight and the pair needs a
    /// switch; surrogate-propose on the opposite master's behalf when it's
    /// the one that's unreachable.
    async fn propose<B: KvBackend>(&self, store: &HaStore<B>, local: &Node, oppo: Option<&Node>, config: &Configuration) -> SwitcherResult<()> {
        let s = pair(local.switch_status, oppo.and_then(|o| o.switch_status));
        if local.switch_status.is_some() || !not_switching(&s) {
            return Ok(());
        }

        if !self.need_switch(store, local, oppo, config).await? {
            return Ok(());
        }

        tracing::info!(node = %local.name, "proposing switch_status=start");
        store
            .update_node(&local.name, NodeUpdate { switch_status: Some(Some(SwitchStatus::Start)), ..Default::default() })
            .await?;

        if local.role == NodeRole::Slave {
            if let Some(oppo) = oppo {
                if oppo.role == NodeRole::Master {
                    let reachable = self.probe.is_reachable(&oppo.ip).await;
                    let expired = heartbeat_overtime(oppo.heartbeat, Utc::now(), config.heartbeat_timeout_second);
                    if !reachable && expired {
                        tracing::warn!(node = %oppo.name, "surrogate-proposing switch_status=start on behalf of unreachable master");
                        store
                            .update_node(&oppo.name, NodeUpdate { switch_status: Some(Some(SwitchStatus::Start)), ..Default::default() })
                            .await?;
                    }
                }
            }
        }
        Ok(())
    }

    /// The shared decision both sides of a pair evaluate identically —
    /// neither node's own view of the pair's state differs, so whichever
    /// one's tick runs first is the one that proposes.
    async fn need_switch<B: KvBackend>(&self, store: &HaStore<B>, local: &Node, oppo: Option<&Node>, config: &Configuration) -> SwitcherResult<bool> {
        use ha_proto::NodeStatus;

        let nodes: Vec<&Node> = std::iter::once(local).chain(oppo).collect();

        if nodes.iter().any(|n| n.excluded_from_failover()) {
            return Ok(false);
        }
        if nodes.iter().any(|n| n.role == NodeRole::Slave && n.status == NodeStatus::Down) {
            return Ok(false);
        }
        if nodes.iter().any(|n| n.role == NodeRole::Master && n.status == NodeStatus::Down) {
            return Ok(true);
        }

        let now = Utc::now();
        for master in nodes.iter().filter(|n| n.role == NodeRole::Master) {
            for svc in store.list_services(Some(&master.name), None, None).await? {
                if svc.status != ServiceStatus::Down {
                    continue;
                }
                if svc.is_necessary {
                    return Ok(true);
                }
                if ha_store::alarmed_timeout(svc.alarmed_at, now, config.unnecessary_service_switch_timeout_hour) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// §4.4.3: runs `DoSwitch` once the pair agrees. A node whose own
    /// `switch_status` is still null but whose peer already reached
    /// `start`/`end` executes in *forced* mode: it first catches its own
    /// record up to `start` (preserving I3's null→start→end→null chain)
    /// before proceeding, and — unlike a *negotiated* switch — skips the
    /// `switch` GitHub issue (the peer that did negotiate already filed it)
    /// and makes sure the local zookeeper service is stopped during demote.
    async fn execute<B: KvBackend>(&self, store: &HaStore<B>, local: &Node, oppo: Option<&Node>, config: &Configuration) -> SwitcherResult<()> {
        let s = pair(local.switch_status, oppo.and_then(|o| o.switch_status));
        if !can_start(&s) || local.switch_status == Some(SwitchStatus::End) {
            return Ok(());
        }

        let forced = local.switch_status.is_none();
        let local = if forced {
            store
                .update_node(&local.name, NodeUpdate { switch_status: Some(Some(SwitchStatus::Start)), ..Default::default() })
                .await?
        } else {
            local.clone()
        };

        match local.role {
            NodeRole::Master => self.demote(store, &local, forced).await,
            NodeRole::Slave => self.promote(store, &local, oppo, config, forced).await,
            NodeRole::Zookeeper => Ok(()),
        }
    }

    /// §4.4.4: stop every owned service except the two timer pseudo-services;
    /// `zookeeper` is also spared in the *negotiated* case (a peer still
    /// reachable on it keeps relying on it) but stopped in *forced* mode
    /// (§4.4.3 — the shutdown step additionally stops the local zookeeper
    /// service when the peer has already driven the cluster past agreement).
    async fn demote<B: KvBackend>(&self, store: &HaStore<B>, local: &Node, forced: bool) -> SwitcherResult<()> {
        tracing::info!(node = %local.name, forced, "demoting");
        let def = service_mapping(local.node_type, local.role);
        for svc_name in def.necessary.iter().chain(def.unnecessary.iter()) {
            if TIMER_PSEUDO_SERVICES.contains(svc_name) || (*svc_name == "zookeeper" && !forced) {
                continue;
            }
            if let Err(e) = self.init_system.stop(svc_name).await {
                tracing::error!(node = %local.name, service = svc_name, error = %e, "failed to stop service during demote");
            }
        }

        store
            .update_node(&local.name, NodeUpdate { role: Some(NodeRole::Slave), switch_status: Some(Some(SwitchStatus::End)), ..Default::default() })
            .await?;
        Ok(())
    }

    /// §4.4.4: for zuul, rewrite DNS and rotate the webhook before flipping
    /// role; then start every owned service except the timer
    /// pseudo-services, sample each once after a settle delay, surrogate the
    /// opposite master's own record if it's unreachable+expired, and — only
    /// for a negotiated switch — file the `switch` issue.
    async fn promote<B: KvBackend>(&self, store: &HaStore<B>, local: &Node, oppo: Option<&Node>, config: &Configuration, forced: bool) -> SwitcherResult<()> {
        tracing::info!(node = %local.name, forced, "promoting");

        if local.node_type == NodeType::Zuul {
            self.rewrite_dns_and_webhook(store, config).await?;
        }

        store
            .update_node(&local.name, NodeUpdate { role: Some(NodeRole::Master), switch_status: Some(Some(SwitchStatus::End)), ..Default::default() })
            .await?;

        let def = service_mapping(local.node_type, NodeRole::Master);
        for svc_name in def.necessary.iter().chain(def.unnecessary.iter()) {
            if TIMER_PSEUDO_SERVICES.contains(svc_name) {
                continue;
            }
            if let Err(e) = self.init_system.start(svc_name).await {
                tracing::error!(node = %local.name, service = svc_name, error = %e, "failed to start service during promote");
            }
        }

        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        for svc_name in def.necessary.iter().chain(def.unnecessary.iter()) {
            let status = self.init_system.status(svc_name).await;
            tracing::info!(node = %local.name, service = svc_name, status = ?status, "post-promotion service sample");
        }

        if let Some(oppo) = oppo {
            let reachable = self.probe.is_reachable(&oppo.ip).await;
            let expired = heartbeat_overtime(oppo.heartbeat, Utc::now(), config.heartbeat_timeout_second);
            if !reachable && expired {
                tracing::warn!(node = %oppo.name, "surrogate-completing switch on behalf of the demoted master");
                store
                    .update_node(&oppo.name, NodeUpdate { role: Some(NodeRole::Slave), switch_status: Some(Some(SwitchStatus::End)), ..Default::default() })
                    .await?;
            }

            if !forced {
                let (title, body) = render(&IssueContext {
                    issuer: local,
                    kind: IssueKind::Switch,
                    affected_node: Some(oppo),
                    affected_service: None,
                });
                if let Err(e) = self.issues.create_issue(&title, &body).await {
                    tracing::error!(error = %e, title, "failed to post switch issue");
                }
            }
        }

        Ok(())
    }

    /// Rewrites both DNS domains from `dns_master_public_ip` to
    /// `dns_slave_public_ip`, swapping the two keys in the store only once
    /// both rewrites succeed, then rotates the webhook. Both kinds of
    /// failure are logged, not propagated — §7's policy for external APIs.
    async fn rewrite_dns_and_webhook<B: KvBackend>(&self, store: &HaStore<B>, config: &Configuration) -> SwitcherResult<()> {
        let dns = DnsClient::new(
            config.dns_api_url.clone(),
            config.dns_provider_token.clone(),
            config.dns_account_id.clone(),
            config.dns_apex_domain.clone(),
        );
        let status_result = dns
            .rewrite_domain(&config.dns_status_domain, &config.dns_master_public_ip, &config.dns_slave_public_ip)
            .await;
        let log_result = dns
            .rewrite_domain(&config.dns_log_domain, &config.dns_master_public_ip, &config.dns_slave_public_ip)
            .await;

        match (&status_result, &log_result) {
            (Ok(()), Ok(())) => {
                let mut updated = config.clone();
                std::mem::swap(&mut updated.dns_master_public_ip, &mut updated.dns_slave_public_ip);
                store.update_configuration(&updated).await?;
            }
            _ => {
                if let Err(e) = status_result {
                    tracing::error!(error = %e, "dns status-domain rewrite failed; configuration left unswapped");
                }
                if let Err(e) = log_result {
                    tracing::error!(error = %e, "dns log-domain rewrite failed; configuration left unswapped");
                }
            }
        }

        if let Err(e) = self.webhook.rotate_webhook(&config.dns_slave_public_ip).await {
            tracing::error!(error = %e, "webhook rotation failed");
        }
        Ok(())
    }

    /// §4.4.5: clear the local flag once the pair has drained `start`, and
    /// surrogate-clear the opposite peer's if it's unreachable+expired.
    async fn terminate<B: KvBackend>(&self, store: &HaStore<B>, local: &Node, oppo: Option<&Node>, config: &Configuration) -> SwitcherResult<()> {
        let s = pair(local.switch_status, oppo.and_then(|o| o.switch_status));
        if !is_end(&s) {
            return Ok(());
        }

        if local.switch_status == Some(SwitchStatus::End) {
            store.update_node(&local.name, NodeUpdate { switch_status: Some(None), ..Default::default() }).await?;
        }

        if let Some(oppo) = oppo {
            if oppo.switch_status == Some(SwitchStatus::End) {
                let reachable = self.probe.is_reachable(&oppo.ip).await;
                let expired = heartbeat_overtime(oppo.heartbeat, Utc::now(), config.heartbeat_timeout_second);
                if !reachable && expired {
                    store.update_node(&oppo.name, NodeUpdate { switch_status: Some(None), ..Default::default() }).await?;
                }
            }
        }
        Ok(())
    }
}
