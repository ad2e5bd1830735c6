//! ha-agent — the per-host HA health-checker and failover controller.
//!
//! Identical binary on every zuul/nodepool/zookeeper node; distinguished
//! only by which node name its own hostname resolves to in the
//! coordination store (§2). Bootstraps from a small ini file just far
//! enough to reach the store, then runs Refresher → Fixer → Switcher on a
//! fixed interval forever.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use ha_agent::config::BootstrapConfig;
use ha_agent::logging::{filter_for_level, LoggingReload};
use ha_agent::{scheduler, Agent};
use ha_exec::{IcmpProbe, InitSystem, LivenessProbe, SystemctlInitSystem};
use ha_sideeffects::{
    GithubAppWebhookRotator, GithubIssueTracker, IssueTracker, WebhookRotator,
};
use ha_store::{HaStore, HttpKvBackend};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, reload};

#[derive(Parser, Debug)]
#[command(name = "ha-agent", about = "HA health-checker and failover controller")]
struct Cli {
    /// Path to the bootstrap ini file (store endpoint + optional hostname
    /// override); everything else lives in /ha/configuration and is
    /// re-read every tick.
    #[arg(long, default_value = "/etc/ha_healthchecker/ha_healthchecker.ini")]
    config: PathBuf,

    /// Override the default 120s tick interval (mainly for local testing).
    #[arg(long)]
    tick_interval_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Configuration error (§7): missing/unparsable bootstrap file is fatal
    // at startup, before any subscriber exists to log through.
    let bootstrap = BootstrapConfig::load(&cli.config).unwrap_or_else(|error| {
        eprintln!("fatal: failed to load bootstrap config {}: {error}", cli.config.display());
        std::process::exit(1);
    });

    let local_name = bootstrap.resolve_local_name();
    let backend = HttpKvBackend::with_options(
        bootstrap.store_endpoint.clone(),
        Duration::from_secs(bootstrap.connect_timeout_secs),
        bootstrap.retries,
    );
    let store = HaStore::new(backend);

    let initial_config = store
        .list_configuration()
        .await
        .context("reading initial configuration from the coordination store")?;

    let (filter_layer, reload_handle) =
        reload::Layer::new(filter_for_level(&initial_config.logging_level));
    let file_writer = open_log_file(&initial_config.logging_path);
    let (non_blocking, _log_guard) = tracing_appender::non_blocking(file_writer);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    info!(
        node = %local_name,
        endpoint = %bootstrap.store_endpoint,
        logging_level = %initial_config.logging_level,
        "ha-agent starting"
    );

    let init_system: Arc<dyn InitSystem> = Arc::new(SystemctlInitSystem);
    let probe: Arc<dyn LivenessProbe> = Arc::new(IcmpProbe);
    let issues: Arc<dyn IssueTracker> = Arc::new(GithubIssueTracker::new(
        initial_config.github_repo.clone(),
        initial_config.github_user_token.clone(),
    ));
    let webhook: Arc<dyn WebhookRotator> =
        Arc::new(GithubAppWebhookRotator::new(initial_config.github_app_name.clone()));
    let logging = LoggingReload::new(Some(reload_handle), &initial_config.logging_level);

    let agent = Agent::new(store, local_name, init_system, probe, issues, webhook, logging);

    let interval = cli
        .tick_interval_secs
        .map(Duration::from_secs)
        .unwrap_or(scheduler::DEFAULT_TICK_INTERVAL);

    scheduler::run_forever(agent, interval).await;
}

/// Opens the rolling file writer `logging_path` configures (§3, §10),
/// creating its parent directory if needed. Falls back to a discard
/// sink on failure so a misconfigured path degrades to stderr-only
/// logging instead of crashing the agent at startup.
fn open_log_file(logging_path: &str) -> tracing_appender::rolling::RollingFileAppender {
    let path = PathBuf::from(logging_path);
    let (dir, file_name) = match (path.parent(), path.file_name()) {
        (Some(dir), Some(name)) if !dir.as_os_str().is_empty() => (dir.to_path_buf(), name.to_owned()),
        _ => (PathBuf::from("."), PathBuf::from("ha_healthchecker.log")),
    };
    if let Err(error) = std::fs::create_dir_all(&dir) {
        eprintln!("warning: could not create log directory {}: {error}", dir.display());
    }
    tracing_appender::rolling::never(dir, file_name)
}
