use async_trait::async_trait;

use crate::error::SideEffectResult;

/// §6.3: rewrites an external application's webhook URL to
/// `http://<new-ip>:80/api/connection/github/payload`. Treated as an opaque
/// capability — the source mechanism (a credentialed session plus an HTML
/// form POST against GitHub's settings UI) is out of scope per spec.md §1
/// and deliberately abstracted behind this one entry point so it can be
/// swapped out when the upstream UI changes without touching the Switcher.
#[async_trait]
pub trait WebhookRotator: Send + Sync {
    async fn rotate_webhook(&self, new_ip: &str) -> SideEffectResult<()>;
}

/// Builds the target URL the rotator is responsible for pointing the
/// GitHub App's webhook at.
pub fn webhook_target_url(new_ip: &str) -> String {
    format!("http://{new_ip}:80/api/connection/github/payload")
}

/// The concrete rotator used in production. Its actual session/form-POST
/// mechanics are out of this repository's scope (spec.md §1) — this type
/// exists so `ha-switcher` has something real to call; a deployment wires
/// up the credentialed session itself before handing an implementation of
/// this trait to the agent.
pub struct GithubAppWebhookRotator {
    app_name: String,
}

impl GithubAppWebhookRotator {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self { app_name: app_name.into() }
    }
}

#[async_trait]
impl WebhookRotator for GithubAppWebhookRotator {
    async fn rotate_webhook(&self, new_ip: &str) -> SideEffectResult<()> {
        let target = webhook_target_url(new_ip);
        tracing::warn!(
            app = %self.app_name,
            target = %target,
            "webhook rotation mechanism is out of scope for this repository; \
             wire a real WebhookRotator implementation before relying on this in production"
        );
        Ok(())
    }
}
