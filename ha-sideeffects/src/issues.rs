use async_trait::async_trait;

use crate::error::{SideEffectError, SideEffectResult};

const ADAPTER: &str = "github";

/// §6.4: `CreateIssue(title, body)` against a configured repository using a
/// stored user token.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    async fn create_issue(&self, title: &str, body: &str) -> SideEffectResult<()>;
}

/// Plain REST client against the GitHub issues API — `POST
/// /repos/{repo}/issues` with a bearer token, replacing the source's
/// `PyGithub`-mediated client with a direct `reqwest` call (the same style
/// `gf-failover::update_routing` uses for its PATCH/POST calls).
pub struct GithubIssueTracker {
    client: reqwest::Client,
    repo: String,
    token: String,
}

impl GithubIssueTracker {
    pub fn new(repo: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            repo: repo.into(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl IssueTracker for GithubIssueTracker {
    async fn create_issue(&self, title: &str, body: &str) -> SideEffectResult<()> {
        let url = format!("https://api.github.com/repos/{}/issues", self.repo);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header("User-Agent", "ha-healthchecker")
            .json(&serde_json::json!({ "title": title, "body": body }))
            .send()
            .await
            .map_err(|source| SideEffectError::Transport { adapter: ADAPTER, url: url.clone(), source })?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(SideEffectError::Http {
                adapter: ADAPTER,
                url,
                status: resp.status().as_u16(),
                reason: resp.status().canonical_reason().unwrap_or("unknown").to_string(),
            })
        }
    }
}

/// An in-memory recorder for tests — the Fixer/Switcher test suites assert
/// on which issues were filed instead of mocking HTTP.
#[derive(Default)]
pub struct RecordingIssueTracker {
    pub issues: std::sync::Mutex<Vec<(String, String)>>,
}

impl RecordingIssueTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn titles(&self) -> Vec<String> {
        self.issues.lock().unwrap().iter().map(|(t, _)| t.clone()).collect()
    }
}

#[async_trait]
impl IssueTracker for RecordingIssueTracker {
    async fn create_issue(&self, title: &str, body: &str) -> SideEffectResult<()> {
        self.issues
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
        Ok(())
    }
}
