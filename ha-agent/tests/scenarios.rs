//! End-to-end coverage of spec.md §8's six scenarios, driven one simulated
//! node at a time against a single shared `MemoryKvBackend` — the same
//! `Agent::tick` the real binary calls, just never wired to a real
//! `HttpKvBackend` or real `systemctl`/`ping`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use ha_agent::{Agent, LoggingReload};
use ha_exec::{FakeInitSystem, FakeLivenessProbe, InitSystem, LivenessProbe, ServiceState};
use ha_proto::{NodeRole, NodeStatus, NodeType, ServiceStatus, SwitchStatus};
use ha_sideeffects::{IssueTracker, RecordingIssueTracker, SideEffectResult, WebhookRotator};
use ha_store::{HaStore, MemoryKvBackend, NodeUpdate};

struct NoopWebhookRotator;

#[async_trait::async_trait]
impl WebhookRotator for NoopWebhookRotator {
    async fn rotate_webhook(&self, _new_ip: &str) -> SideEffectResult<()> {
        Ok(())
    }
}

/// One simulated node: its `Agent` plus the `FakeInitSystem` driving it, so
/// a test can script `set_status`/`calls()` per node while every agent
/// shares the same coordination store, liveness probe, and issue tracker.
struct SimNode {
    agent: Agent<MemoryKvBackend>,
    init: Arc<FakeInitSystem>,
}

fn sim_node(
    store: &HaStore<MemoryKvBackend>,
    name: &str,
    probe: &Arc<dyn LivenessProbe>,
    issues: &Arc<dyn IssueTracker>,
) -> SimNode {
    let init = Arc::new(FakeInitSystem::new());
    let agent = Agent::new(
        store.clone(),
        name,
        init.clone() as Arc<dyn InitSystem>,
        probe.clone(),
        issues.clone(),
        Arc::new(NoopWebhookRotator) as Arc<dyn WebhookRotator>,
        LoggingReload::disabled(),
    );
    SimNode { agent, init }
}

async fn zuul_pair(store: &HaStore<MemoryKvBackend>) {
    store
        .create_node("rax-openlab-zuul", NodeRole::Master, NodeType::Zuul, "10.0.1.1")
        .await
        .unwrap();
    store
        .create_node("ovh-openlab-zuul", NodeRole::Slave, NodeType::Zuul, "10.0.1.2")
        .await
        .unwrap();
}

async fn nodepool_pair(store: &HaStore<MemoryKvBackend>) {
    store
        .create_node("rax-openlab-np", NodeRole::Master, NodeType::Nodepool, "10.0.2.1")
        .await
        .unwrap();
    store
        .create_node("ovh-openlab-np", NodeRole::Slave, NodeType::Nodepool, "10.0.2.2")
        .await
        .unwrap();
}

/// Backdates `name`'s heartbeat well past `heartbeat_timeout_second` (180s
/// by default) without going through a live tick, simulating a node that
/// stopped ticking `seconds_ago` in the past.
async fn backdate_heartbeat(store: &HaStore<MemoryKvBackend>, name: &str, seconds_ago: i64) {
    store
        .update_node(
            name,
            NodeUpdate { heartbeat: Some(Utc::now() - Duration::seconds(seconds_ago)), ..Default::default() },
        )
        .await
        .unwrap();
}

// 1. Healthy cluster heartbeat -----------------------------------------------

#[tokio::test]
async fn healthy_cluster_heartbeat_never_touches_switch_status() {
    let store = HaStore::new(MemoryKvBackend::new());
    zuul_pair(&store).await;
    nodepool_pair(&store).await;

    let probe: Arc<dyn LivenessProbe> = Arc::new(FakeLivenessProbe::new());
    let recorder = Arc::new(RecordingIssueTracker::new());
    let issues: Arc<dyn IssueTracker> = recorder.clone();

    let names = ["rax-openlab-zuul", "ovh-openlab-zuul", "rax-openlab-np", "ovh-openlab-np"];
    let nodes: Vec<SimNode> = names.iter().map(|n| sim_node(&store, n, &probe, &issues)).collect();

    let mut last_heartbeat: HashMap<&str, DateTime<Utc>> = HashMap::new();
    for _ in 0..3 {
        for node in &nodes {
            node.agent.tick().await.unwrap();
        }
        for name in names {
            let node = store.get_node(name).await.unwrap();
            assert_eq!(node.switch_status, None, "{name} switch_status must stay null");
            if let Some(prev) = last_heartbeat.get(name) {
                assert!(node.heartbeat >= *prev, "{name} heartbeat must advance monotonically");
            }
            last_heartbeat.insert(name, node.heartbeat);
        }
    }

    for name in names {
        assert_eq!(store.get_node(name).await.unwrap().status, NodeStatus::Up);
    }
    assert!(recorder.titles().is_empty(), "no issues expected on an all-healthy cluster");
}

// 2. Transient unit restart ---------------------------------------------------

#[tokio::test]
async fn transient_unit_restart_recovers_without_a_switch() {
    let store = HaStore::new(MemoryKvBackend::new());
    zuul_pair(&store).await;

    let probe: Arc<dyn LivenessProbe> = Arc::new(FakeLivenessProbe::new());
    let recorder = Arc::new(RecordingIssueTracker::new());
    let issues: Arc<dyn IssueTracker> = recorder.clone();
    let master = sim_node(&store, "rax-openlab-zuul", &probe, &issues);
    let slave = sim_node(&store, "ovh-openlab-zuul", &probe, &issues);

    // Settle both nodes to up first, as scenario 1 does.
    master.agent.tick().await.unwrap();
    slave.agent.tick().await.unwrap();

    // Tick T: zuul-web starts reporting down on the master.
    master.init.set_status("zuul-web", ServiceState::Down);
    master.agent.tick().await.unwrap();

    let svc = store.get_service("rax-openlab-zuul", "zuul-web").await.unwrap();
    assert_eq!(svc.status, ServiceStatus::Restarting);
    assert!(svc.restarted);
    assert!(
        master.init.calls().contains(&("restart".to_string(), "zuul-web".to_string())),
        "the fixer must invoke systemctl restart zuul-web"
    );
    assert_eq!(store.get_node("rax-openlab-zuul").await.unwrap().switch_status, None);

    // Tick T+1: zuul-web recovers.
    master.init.set_status("zuul-web", ServiceState::Up);
    master.agent.tick().await.unwrap();

    let svc = store.get_service("rax-openlab-zuul", "zuul-web").await.unwrap();
    assert_eq!(svc.status, ServiceStatus::Up);
    assert!(!svc.restarted);
    assert_eq!(svc.restarted_count, 0);
    assert_eq!(store.get_node("rax-openlab-zuul").await.unwrap().switch_status, None);
}

// 3. Master node unreachable --------------------------------------------------

#[tokio::test(start_paused = true)]
async fn unreachable_master_drives_a_full_failover_with_dns_and_webhook() {
    let store = HaStore::new(MemoryKvBackend::new());
    zuul_pair(&store).await;

    let probe = Arc::new(FakeLivenessProbe::new());
    let probe_dyn: Arc<dyn LivenessProbe> = probe.clone();
    let recorder = Arc::new(RecordingIssueTracker::new());
    let issues: Arc<dyn IssueTracker> = recorder.clone();
    let master = sim_node(&store, "rax-openlab-zuul", &probe_dyn, &issues);
    let slave = sim_node(&store, "ovh-openlab-zuul", &probe_dyn, &issues);

    // Both reach up before the master goes dark.
    master.agent.tick().await.unwrap();
    slave.agent.tick().await.unwrap();

    // T: master becomes unreachable and stops ticking entirely.
    probe.mark_unreachable("10.0.1.1");
    backdate_heartbeat(&store, "rax-openlab-zuul", 1000).await;

    // T+1/T+2 collapse into the slave's first tick after the master dies:
    // its Refresher marks the master down, then its Switcher proposes,
    // surrogate-proposes, and executes the promotion in the same call
    // (§4.4 — CanStart holds as soon as both sides reach start).
    slave.agent.tick().await.unwrap();

    let promoted = store.get_node("ovh-openlab-zuul").await.unwrap();
    assert_eq!(promoted.role, NodeRole::Master);
    assert_eq!(promoted.switch_status, Some(SwitchStatus::End));
    let demoted = store.get_node("rax-openlab-zuul").await.unwrap();
    assert_eq!(demoted.role, NodeRole::Slave);
    assert_eq!(demoted.switch_status, Some(SwitchStatus::End));

    assert!(
        slave.init.calls().iter().any(|(cmd, svc)| cmd == "start" && svc == "zuul-scheduler"),
        "promotion must start the master service set"
    );
    assert!(recorder.titles().iter().any(|t| t.contains("switch")), "a switch issue must be filed");

    // T+3/T+4: the next tick on the now-master drains the handshake on
    // both sides via surrogate, since the old master stays unreachable.
    slave.agent.tick().await.unwrap();
    assert_eq!(store.get_node("ovh-openlab-zuul").await.unwrap().switch_status, None);
    assert_eq!(store.get_node("rax-openlab-zuul").await.unwrap().switch_status, None);
}

// 4. Necessary service down on master -----------------------------------------

#[tokio::test(start_paused = true)]
async fn necessary_service_down_on_master_forces_an_immediate_switch_without_dns() {
    let store = HaStore::new(MemoryKvBackend::new());
    nodepool_pair(&store).await;

    let probe: Arc<dyn LivenessProbe> = Arc::new(FakeLivenessProbe::new());
    let recorder = Arc::new(RecordingIssueTracker::new());
    let issues: Arc<dyn IssueTracker> = recorder.clone();
    let master = sim_node(&store, "rax-openlab-np", &probe, &issues);
    let slave = sim_node(&store, "ovh-openlab-np", &probe, &issues);

    master.agent.tick().await.unwrap();
    slave.agent.tick().await.unwrap();

    // nodepool-launcher (necessary) goes down and stays down across enough
    // master ticks to exceed the restart budget (1 tick into `restarting`,
    // then 5 more for `restarted_count` to climb past
    // `service_restart_max_times`, default 3).
    master.init.set_status("nodepool-launcher", ServiceState::Down);
    for _ in 0..6 {
        master.agent.tick().await.unwrap();
    }

    let svc = store.get_service("rax-openlab-np", "nodepool-launcher").await.unwrap();
    assert_eq!(svc.status, ServiceStatus::Down);
    assert!(
        recorder.titles().iter().any(|t| t.contains("service_down")),
        "an immediate service_down issue must be filed once the service is down"
    );
    assert_eq!(
        store.get_node("rax-openlab-np").await.unwrap().switch_status,
        Some(SwitchStatus::Start),
        "the master's own Switcher run already self-proposed within the same tick the service went down"
    );

    // The slave (reachable, so no surrogate involved) proposes and
    // executes its promotion in one tick since the master is already at
    // start; the master then demotes on its own next tick once it
    // observes {start, end}.
    slave.agent.tick().await.unwrap();
    let promoted = store.get_node("ovh-openlab-np").await.unwrap();
    assert_eq!(promoted.role, NodeRole::Master);
    assert_eq!(promoted.switch_status, Some(SwitchStatus::End));

    master.agent.tick().await.unwrap();
    let demoted = store.get_node("rax-openlab-np").await.unwrap();
    assert_eq!(demoted.role, NodeRole::Slave);
    assert_eq!(demoted.switch_status, Some(SwitchStatus::End));

    // Both sides independently drain back to null on their own next tick —
    // neither is unreachable here, so nothing surrogate-clears for them.
    slave.agent.tick().await.unwrap();
    master.agent.tick().await.unwrap();
    assert_eq!(store.get_node("rax-openlab-np").await.unwrap().switch_status, None);
    assert_eq!(store.get_node("ovh-openlab-np").await.unwrap().switch_status, None);

    assert!(
        recorder.titles().iter().any(|t| t.contains("switch")),
        "a switch issue must be filed for the negotiated failover"
    );
}

// 5. Unnecessary service flap --------------------------------------------------

#[tokio::test]
async fn unnecessary_service_flap_files_one_issue_then_times_out_into_a_switch() {
    let backend = MemoryKvBackend::new();
    let store = HaStore::new(backend.clone());
    zuul_pair(&store).await;

    let probe: Arc<dyn LivenessProbe> = Arc::new(FakeLivenessProbe::new());
    let recorder = Arc::new(RecordingIssueTracker::new());
    let issues: Arc<dyn IssueTracker> = recorder.clone();
    let master = sim_node(&store, "rax-openlab-zuul", &probe, &issues);
    let slave = sim_node(&store, "ovh-openlab-zuul", &probe, &issues);

    master.agent.tick().await.unwrap();
    slave.agent.tick().await.unwrap();

    master.init.set_status("zuul-merger", ServiceState::Down);

    // The Refresher parks it in `restarting` and climbs `restarted_count`
    // for several ticks before it exceeds `service_restart_max_times`
    // (default 3) and the service is finally observed `down`, at which
    // point the Fixer files the first issue in that same tick.
    for _ in 0..6 {
        master.agent.tick().await.unwrap();
    }

    let svc = store.get_service("rax-openlab-zuul", "zuul-merger").await.unwrap();
    assert_eq!(svc.status, ServiceStatus::Down);
    assert!(!svc.is_necessary);
    assert_eq!(
        recorder.titles().iter().filter(|t| t.contains("service_down")).count(),
        1,
        "exactly one service_down issue for this failure episode"
    );
    assert_eq!(
        store.get_node("rax-openlab-zuul").await.unwrap().switch_status,
        None,
        "an unnecessary-service failure alone must not trigger a switch"
    );

    // Age the alarm past the unnecessary-service switch timeout (24h
    // default) without waiting for real ticks to accumulate it.
    backdate_service_alarm(&store, &backend, "rax-openlab-zuul", "zuul-merger", Duration::hours(25)).await;

    master.agent.tick().await.unwrap();

    assert!(
        recorder.titles().iter().any(|t| t.contains("service_timeout")),
        "a service_timeout issue must be filed once the unnecessary failure ages out"
    );
    assert_eq!(
        store.get_node("rax-openlab-zuul").await.unwrap().switch_status,
        Some(SwitchStatus::Start),
        "NeedSwitch must now hold for the aged-out unnecessary-service failure"
    );
}

// 6. Maintenance suppresses switch ---------------------------------------------

#[tokio::test]
async fn maintaining_master_never_proposes_a_switch() {
    let store = HaStore::new(MemoryKvBackend::new());
    zuul_pair(&store).await;

    let probe: Arc<dyn LivenessProbe> = Arc::new(FakeLivenessProbe::new());
    let recorder = Arc::new(RecordingIssueTracker::new());
    let issues: Arc<dyn IssueTracker> = recorder.clone();
    let master = sim_node(&store, "rax-openlab-zuul", &probe, &issues);
    let slave = sim_node(&store, "ovh-openlab-zuul", &probe, &issues);

    // Settle to up, then the operator puts the master into maintenance —
    // only permitted from `Up` (§3, I4).
    master.agent.tick().await.unwrap();
    slave.agent.tick().await.unwrap();
    store
        .update_node("rax-openlab-zuul", NodeUpdate { maintain: Some(true), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(store.get_node("rax-openlab-zuul").await.unwrap().status, NodeStatus::Maintaining);

    // Every service on the master now reports down from the probe.
    for svc in ["zuul-scheduler", "zuul-web", "zuul-merger", "zuul-executor"] {
        master.init.set_status(svc, ServiceState::Down);
    }

    for _ in 0..6 {
        master.agent.tick().await.unwrap();
        slave.agent.tick().await.unwrap();
    }

    assert_eq!(
        store.get_node("rax-openlab-zuul").await.unwrap().switch_status,
        None,
        "a maintaining node must never enter the switch handshake"
    );
    assert_eq!(store.get_node("rax-openlab-zuul").await.unwrap().role, NodeRole::Master);
    assert_eq!(store.get_node("ovh-openlab-zuul").await.unwrap().role, NodeRole::Slave);
    assert_eq!(
        store.get_node("ovh-openlab-zuul").await.unwrap().switch_status,
        None,
        "the slave has no reason to propose either — the master is excluded, not down"
    );
    assert!(
        recorder.titles().is_empty(),
        "maintenance must suppress both service_down and switch issues, not just the switch"
    );

    // The Refresher never touched the local loop, so the service records
    // never moved off whatever they were left at before maintenance began.
    let svc = store.get_service("rax-openlab-zuul", "zuul-web").await.unwrap();
    assert_eq!(svc.status, ServiceStatus::Up);
}

/// Test-only helper: `ServiceUpdate` has no `alarmed_at` field (the store
/// always stamps it to "now" the moment `alarmed` flips true, mirroring the
/// source's `datetime.now()` write), so scenario 5's timeout branch is
/// reached here by going around `HaStore` to the raw backend the test kept
/// a handle to, pushing the service record's `alarmed_at` back by `age`
/// rather than waiting out 24 real hours.
async fn backdate_service_alarm(
    store: &HaStore<MemoryKvBackend>,
    backend: &MemoryKvBackend,
    node_name: &str,
    service_name: &str,
    age: Duration,
) {
    use ha_store::KvBackend;

    let node = store.get_node(node_name).await.unwrap();
    let key = ha_store::service_key(node_name, node.role, service_name);
    let bytes = backend.get(&key).await.unwrap().unwrap();
    let mut service: ha_proto::Service = serde_json::from_slice(&bytes).unwrap();
    service.alarmed_at = Some(service.alarmed_at.unwrap_or_else(Utc::now) - age);
    backend.put(&key, serde_json::to_vec(&service).unwrap()).await.unwrap();
}
