//! External side-effect adapters (§6.2–§6.4): the DNS rewrite client, the
//! abstract webhook rotator capability, and the issue-tracker client. None
//! of these retry within a tick (§7) — a failure is logged and the next
//! tick re-evaluates.

mod dns;
mod error;
mod issues;
mod webhook;

pub use dns::DnsClient;
pub use error::{SideEffectError, SideEffectResult};
pub use issues::{GithubIssueTracker, IssueTracker, RecordingIssueTracker};
pub use webhook::{webhook_target_url, GithubAppWebhookRotator, WebhookRotator};
