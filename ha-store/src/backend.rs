use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{StoreError, StoreResult};

/// The minimal contract the rest of the system needs from the coordination
/// store: atomic per-key read/write, recursive delete by prefix, and a
/// prefix scan. Both the in-memory test backend and the HTTP backend
/// implement this; `HaStore` (store.rs) is built on top of it and knows
/// nothing about HTTP or locking.
#[async_trait]
pub trait KvBackend: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;
    async fn put(&self, key: &str, value: Vec<u8>) -> StoreResult<()>;
    async fn delete(&self, key: &str) -> StoreResult<()>;
    async fn delete_prefix(&self, prefix: &str) -> StoreResult<()>;
    /// Keys strictly under `prefix`, sorted, each paired with its value.
    async fn list_prefix(&self, prefix: &str) -> StoreResult<Vec<(String, Vec<u8>)>>;
}

/// An in-process backend for tests: every `ha-refresher`/`ha-fixer`/
/// `ha-switcher` test exercises the real `HaStore` validation logic against
/// this instead of mocking `HaStore` itself.
#[derive(Default, Clone)]
pub struct MemoryKvBackend {
    inner: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryKvBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvBackend for MemoryKvBackend {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.inner.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> StoreResult<()> {
        self.inner.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.inner.write().await.remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> StoreResult<()> {
        let mut guard = self.inner.write().await;
        let doomed: Vec<String> = guard
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();
        for key in doomed {
            guard.remove(&key);
        }
        Ok(())
    }

    async fn list_prefix(&self, prefix: &str) -> StoreResult<Vec<(String, Vec<u8>)>> {
        let guard = self.inner.read().await;
        Ok(guard
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

/// HTTP backend against an etcd-like JSON KV gateway. The coordination
/// store's contract (§4.1) only requires linearizable per-key read/write,
/// recursive create/delete, and read-your-writes within a session — an
/// ephemeral-session/watch capability is explicitly not required, so this
/// backend speaks a plain request/response JSON protocol rather than a
/// Zookeeper client.
///
/// Wire shape, one JSON object per call:
/// - `GET  {base}/kv/{key}`            → `{"value": "<base64>"}` or 404
/// - `PUT  {base}/kv/{key}`            body `{"value": "<base64>"}`
/// - `DELETE {base}/kv/{key}`
/// - `DELETE {base}/kv/{prefix}?recursive=true`
/// - `GET  {base}/kv/{prefix}?prefix=true` → `{"entries": [{"key":..., "value":"<base64>"}]}`
pub struct HttpKvBackend {
    client: reqwest::Client,
    base_url: String,
    retries: usize,
}

impl HttpKvBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_options(base_url, Duration::from_secs(5), 5)
    }

    pub fn with_options(base_url: impl Into<String>, connect_timeout: Duration, retries: usize) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .expect("reqwest client building with static config cannot fail");
        Self {
            client,
            base_url: base_url.into(),
            retries,
        }
    }

    async fn with_retries<F, Fut, T>(&self, op: F) -> StoreResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, reqwest::Error>>,
    {
        let mut last_err = None;
        for attempt in 0..=self.retries {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    tracing::debug!(attempt, error = %e, "store rpc attempt failed");
                    last_err = Some(e);
                }
            }
        }
        Err(StoreError::Unavailable(
            last_err.map(|e| e.to_string()).unwrap_or_default(),
        ))
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct ValueEnvelope {
    value: String,
}

#[derive(serde::Deserialize)]
struct ListResponse {
    entries: Vec<ListEntry>,
}

#[derive(serde::Deserialize)]
struct ListEntry {
    key: String,
    value: String,
}

#[async_trait]
impl KvBackend for HttpKvBackend {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let url = format!("{}/kv/{}", self.base_url, key.trim_start_matches('/'));
        let resp = self
            .with_retries(|| self.client.get(&url).send())
            .await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = resp
            .error_for_status()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let body: ValueEnvelope = resp
            .json()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let bytes = base64_decode(&body.value)?;
        Ok(Some(bytes))
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> StoreResult<()> {
        let url = format!("{}/kv/{}", self.base_url, key.trim_start_matches('/'));
        let body = ValueEnvelope {
            value: base64_encode(&value),
        };
        self.with_retries(|| self.client.put(&url).json(&body).send())
            .await?
            .error_for_status()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let url = format!("{}/kv/{}", self.base_url, key.trim_start_matches('/'));
        self.with_retries(|| self.client.delete(&url).send())
            .await?
            .error_for_status()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> StoreResult<()> {
        let url = format!(
            "{}/kv/{}?recursive=true",
            self.base_url,
            prefix.trim_start_matches('/')
        );
        self.with_retries(|| self.client.delete(&url).send())
            .await?
            .error_for_status()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn list_prefix(&self, prefix: &str) -> StoreResult<Vec<(String, Vec<u8>)>> {
        let url = format!(
            "{}/kv/{}?prefix=true",
            self.base_url,
            prefix.trim_start_matches('/')
        );
        let resp = self
            .with_retries(|| self.client.get(&url).send())
            .await?
            .error_for_status()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let body: ListResponse = resp
            .json()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        body.entries
            .into_iter()
            .map(|e| Ok((e.key, base64_decode(&e.value)?)))
            .collect()
    }
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

fn base64_decode(s: &str) -> StoreResult<Vec<u8>> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(s)
        .map_err(|e| StoreError::InvalidValue(format!("malformed base64 from store: {e}")))
}
