//! The scheduler (§4.5): a single periodic job per agent, strictly
//! sequential — the next tick's sleep only starts once the current one has
//! fully returned, so one tick never overlaps its predecessor. Collapses
//! the source's three near-duplicate cron-driven scripts
//! (`refresh.py`/`fix.py`/`kp_local_loop.py`) into one loop over the three
//! components `Agent::tick` already runs in order.

use std::time::Duration;

use ha_store::KvBackend;

use crate::agent::Agent;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(120);

/// Runs `agent.tick()` forever, sleeping `interval` between completions.
/// A component error aborts just that tick (logged); the next tick opens
/// fresh (§4.5, §7) — there is no retry within a tick and no backoff
/// between ticks, matching the source's plain fixed-interval cron cadence.
pub async fn run_forever<B: KvBackend>(agent: Agent<B>, interval: Duration) -> ! {
    let mut tick_id: u64 = 0;
    loop {
        tick_id += 1;
        run_one_tick(&agent, tick_id).await;
        tokio::time::sleep(interval).await;
    }
}

async fn run_one_tick<B: KvBackend>(agent: &Agent<B>, tick_id: u64) {
    let span = tracing::info_span!("tick", tick_id, node = %agent.local_name());
    let _enter = span.enter();
    tracing::debug!("tick starting");
    match agent.tick().await {
        Ok(()) => tracing::debug!("tick completed"),
        Err(error) => tracing::error!(%error, "tick aborted; reconnecting next tick"),
    }
}
