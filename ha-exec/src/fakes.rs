//! In-memory doubles for `InitSystem` and `LivenessProbe`, exported
//! (`feature`-free, always built) so `ha-refresher`/`ha-fixer`/`ha-switcher`
//! can drive real decision logic in tests without shelling out. Mirrors how
//! `ha-store::MemoryKvBackend` lets the rest of the workspace test against
//! real semantics instead of mocks.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::ExecResult;
use crate::init_system::{InitSystem, ServiceState};
use crate::probe::LivenessProbe;

/// A scripted init system: callers preload the status each unit should
/// report, and record which subcommands were invoked for assertions.
#[derive(Default)]
pub struct FakeInitSystem {
    statuses: Mutex<HashMap<String, ServiceState>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl FakeInitSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, service_name: &str, state: ServiceState) {
        self.statuses
            .lock()
            .unwrap()
            .insert(service_name.to_string(), state);
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, subcommand: &str, service_name: &str) {
        self.calls
            .lock()
            .unwrap()
            .push((subcommand.to_string(), service_name.to_string()));
    }
}

#[async_trait]
impl InitSystem for FakeInitSystem {
    async fn status(&self, service_name: &str) -> ExecResult<ServiceState> {
        self.record("status", service_name);
        Ok(*self
            .statuses
            .lock()
            .unwrap()
            .get(service_name)
            .unwrap_or(&ServiceState::Up))
    }

    async fn restart(&self, service_name: &str) -> ExecResult<()> {
        self.record("restart", service_name);
        Ok(())
    }

    async fn start(&self, service_name: &str) -> ExecResult<()> {
        self.record("start", service_name);
        Ok(())
    }

    async fn stop(&self, service_name: &str) -> ExecResult<()> {
        self.record("stop", service_name);
        Ok(())
    }
}

/// A scripted liveness probe: callers mark specific IPs unreachable, every
/// other IP is reachable by default.
#[derive(Default)]
pub struct FakeLivenessProbe {
    unreachable: Mutex<std::collections::HashSet<String>>,
}

impl FakeLivenessProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_unreachable(&self, ip: &str) {
        self.unreachable.lock().unwrap().insert(ip.to_string());
    }

    pub fn mark_reachable(&self, ip: &str) {
        self.unreachable.lock().unwrap().remove(ip);
    }
}

#[async_trait]
impl LivenessProbe for FakeLivenessProbe {
    async fn is_reachable(&self, ip: &str) -> bool {
        !self.unreachable.lock().unwrap().contains(ip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_init_system_reports_preloaded_status() {
        let fake = FakeInitSystem::new();
        fake.set_status("zuul-web", ServiceState::Down);
        assert_eq!(fake.status("zuul-web").await.unwrap(), ServiceState::Down);
        assert_eq!(fake.status("mysql").await.unwrap(), ServiceState::Up);
        assert_eq!(fake.calls().len(), 2);
    }

    #[tokio::test]
    async fn fake_probe_defaults_to_reachable() {
        let fake = FakeLivenessProbe::new();
        assert!(fake.is_reachable("10.0.0.1").await);
        fake.mark_unreachable("10.0.0.1");
        assert!(!fake.is_reachable("10.0.0.1").await);
        fake.mark_reachable("10.0.0.1");
        assert!(fake.is_reachable("10.0.0.1").await);
    }
}
