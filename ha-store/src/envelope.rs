use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wraps a stored payload with the timestamps the wire format documents as
/// coming "from store metadata, not payload" (spec.md §3). A generic
/// etcd-like KV contract has no built-in `ctime`/`mtime` the way Zookeeper
/// does, so this repository carries them inside the stored value instead
/// and calls the distinction out here rather than pretending the backend
/// supplies them for free.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub value: T,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<T> Envelope<T> {
    pub fn new(value: T) -> Self {
        let now = Utc::now();
        Self {
            value,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self, value: T) {
        self.value = value;
        self.updated_at = Utc::now();
    }
}
