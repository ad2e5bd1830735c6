use serde::Deserialize;

use crate::error::{SideEffectError, SideEffectResult};

const ADAPTER: &str = "dns";

/// Bit-exact client for §6.2: `GET /accounts`, then `GET
/// /{account}/zones/{apex}/records?name=<label>` for each of the two
/// domains, then `PATCH /{account}/zones/{apex}/records/{id}` with the new
/// IP. Mirrors `Switcher._change_dns` in the source line for line, minus
/// the HTML/session plumbing that file mixes in for the (separately
/// abstracted) webhook rotation.
pub struct DnsClient {
    client: reqwest::Client,
    api_url: String,
    token: String,
    account_id: String,
    apex_domain: String,
}

#[derive(Deserialize)]
struct AccountsResponse {
    data: Vec<Account>,
}

#[derive(Deserialize)]
struct Account {
    id: String,
}

#[derive(Deserialize)]
struct RecordsResponse {
    data: Vec<Record>,
}

#[derive(Deserialize)]
struct Record {
    id: String,
    name: String,
    #[serde(rename = "type")]
    record_type: String,
    content: String,
}

#[derive(Deserialize)]
struct PatchResponse {
    data: PatchRecord,
}

#[derive(Deserialize)]
struct PatchRecord {
    content: String,
}

impl DnsClient {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>, account_id: impl Into<String>, apex_domain: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into(),
            token: token.into(),
            account_id: account_id.into(),
            apex_domain: apex_domain.into(),
        }
    }

    fn label_of(&self, domain: &str) -> String {
        domain
            .strip_suffix(&format!(".{}", self.apex_domain))
            .unwrap_or(domain)
            .to_string()
    }

    async fn resolve_account_id(&self) -> SideEffectResult<String> {
        let url = format!("{}/accounts", self.api_url);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|source| SideEffectError::Transport { adapter: ADAPTER, url: url.clone(), source })?;
        if resp.status() != reqwest::StatusCode::OK {
            return Err(SideEffectError::Http {
                adapter: ADAPTER,
                url,
                status: resp.status().as_u16(),
                reason: resp.status().canonical_reason().unwrap_or("unknown").to_string(),
            });
        }
        let body: AccountsResponse = resp
            .json()
            .await
            .map_err(|source| SideEffectError::Transport { adapter: ADAPTER, url, source })?;
        body.data
            .into_iter()
            .find(|a| a.id == self.account_id)
            .map(|a| a.id)
            .ok_or_else(|| SideEffectError::RecordNotFound(format!("account {}", self.account_id)))
    }

    async fn find_record(&self, account_id: &str, label: &str, expected_content: &str) -> SideEffectResult<Option<String>> {
        let url = format!(
            "{}/{}/zones/{}/records?name={}",
            self.api_url, account_id, self.apex_domain, label
        );
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|source| SideEffectError::Transport { adapter: ADAPTER, url: url.clone(), source })?;
        if resp.status() != reqwest::StatusCode::OK {
            return Err(SideEffectError::Http {
                adapter: ADAPTER,
                url,
                status: resp.status().as_u16(),
                reason: resp.status().canonical_reason().unwrap_or("unknown").to_string(),
            });
        }
        let body: RecordsResponse = resp
            .json()
            .await
            .map_err(|source| SideEffectError::Transport { adapter: ADAPTER, url, source })?;
        Ok(body
            .data
            .into_iter()
            .find(|r| self.matches(r, label, expected_content))
            .map(|r| r.id))
    }

    /// A record is matched iff `name==label ∧ type=="A" ∧
    /// content==dns_master_public_ip` (§6.2). Re-invoking the rewrite once a
    /// record already points at the slave IP makes the matcher fail and the
    /// rewrite becomes a no-op — P6's idempotency property.
    fn matches(&self, record: &Record, label: &str, expected_content: &str) -> bool {
        record.name == label && record.record_type == "A" && record.content == expected_content
    }

    async fn patch_record(&self, account_id: &str, record_id: &str, new_ip: &str) -> SideEffectResult<()> {
        let url = format!(
            "{}/{}/zones/{}/records/{}",
            self.api_url, account_id, self.apex_domain, record_id
        );
        let resp = self
            .client
            .patch(&url)
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "content": new_ip }))
            .send()
            .await
            .map_err(|source| SideEffectError::Transport { adapter: ADAPTER, url: url.clone(), source })?;
        let status = resp.status();
        let body: PatchResponse = resp
            .json()
            .await
            .map_err(|source| SideEffectError::Transport { adapter: ADAPTER, url: url.clone(), source })?;
        if status == reqwest::StatusCode::OK && body.data.content == new_ip {
            Ok(())
        } else {
            Err(SideEffectError::Http {
                adapter: ADAPTER,
                url,
                status: status.as_u16(),
                reason: "record content did not update to the expected IP".to_string(),
            })
        }
    }

    /// Rewrites one domain's A-record from `current_ip` to `new_ip`. A
    /// record that doesn't match (already rewritten, or missing) is logged
    /// and treated as a no-op rather than an error — §6.2/P6.
    pub async fn rewrite_domain(&self, domain: &str, current_ip: &str, new_ip: &str) -> SideEffectResult<()> {
        let account_id = self.resolve_account_id().await?;
        let label = self.label_of(domain);
        match self.find_record(&account_id, &label, current_ip).await? {
            Some(record_id) => self.patch_record(&account_id, &record_id, new_ip).await,
            None => {
                tracing::info!(domain, current_ip, "dns record already matches new target or was not found; no-op");
                Ok(())
            }
        }
    }
}
