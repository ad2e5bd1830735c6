//! The per-host agent (§2, §4.5): owns the store client and every
//! side-effect adapter, and runs one tick as Refresher → Fixer → Switcher
//! in that fixed order. Replaces the source's cross-process global
//! singletons (a module-level store client and a module-level "local node"
//! snapshot shared by `refresh.py`/`fix.py`/`kp_local_loop.py`) with a
//! single struct constructed once at startup and reused tick to tick — the
//! store "session" spec.md's scheduler describes is this struct's
//! lifetime, not a fresh TCP connection per tick.

use std::sync::Arc;

use ha_exec::{InitSystem, LivenessProbe};
use ha_fixer::Fixer;
use ha_proto::Configuration;
use ha_refresher::Refresher;
use ha_sideeffects::{IssueTracker, WebhookRotator};
use ha_store::{HaStore, KvBackend};
use ha_switcher::Switcher;

use crate::error::{TickError, TickResult};
use crate::logging::LoggingReload;

pub struct Agent<B: KvBackend> {
    store: HaStore<B>,
    local_name: String,
    refresher: Refresher,
    fixer: Fixer,
    switcher: Switcher,
    logging: LoggingReload,
}

impl<B: KvBackend> Agent<B> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: HaStore<B>,
        local_name: impl Into<String>,
        init_system: Arc<dyn InitSystem>,
        probe: Arc<dyn LivenessProbe>,
        issues: Arc<dyn IssueTracker>,
        webhook: Arc<dyn WebhookRotator>,
        logging: LoggingReload,
    ) -> Self {
        let refresher = Refresher::new(init_system.clone(), probe.clone());
        let fixer = Fixer::new(init_system.clone(), probe.clone(), issues.clone());
        let switcher = Switcher::new(init_system, probe, webhook, issues);
        Self {
            store,
            local_name: local_name.into(),
            refresher,
            fixer,
            switcher,
            logging,
        }
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    pub fn store(&self) -> &HaStore<B> {
        &self.store
    }

    /// One tick (§4.5): refresh configuration, then Refresher, Fixer,
    /// Switcher in that order — load-bearing per §5, since the Switcher's
    /// decisions rely on statuses the Refresher and Fixer wrote earlier in
    /// the same tick. A configuration-refresh failure aborts the whole
    /// tick (§7); any other component's failure is this function's
    /// problem alone to report, never cancels a component that hasn't run
    /// yet in a way that isn't already expressed by early return here —
    /// matching §7's propagation policy of "confined to the raising
    /// component", since nothing downstream runs once an upstream one
    /// fails within this fixed ordering anyway.
    pub async fn tick(&self) -> TickResult<()> {
        let config = self.refresh_configuration().await?;

        self.refresher.run(&self.store, &self.local_name, &config).await?;
        self.fixer.run(&self.store, &self.local_name, &config).await?;
        self.switcher.run(&self.store, &self.local_name, &config).await?;

        Ok(())
    }

    async fn refresh_configuration(&self) -> TickResult<Configuration> {
        let config = self
            .store
            .list_configuration()
            .await
            .map_err(TickError::ConfigRefresh)?;
        self.logging.apply(&config.logging_level);
        Ok(config)
    }
}
