//! Coordination-store client: the `KvBackend` contract (HTTP and in-memory
//! implementations), the envelope that attaches store-supplied
//! `created_at`/`updated_at` metadata to a payload, and `HaStore` — the
//! domain-level API (§4.1) the rest of the system is built against.

mod backend;
mod envelope;
mod error;
mod keys;
mod node_record;
mod store;
mod timeouts;
mod topology;
mod updates;

pub use backend::{HttpKvBackend, KvBackend, MemoryKvBackend};
pub use envelope::Envelope;
pub use error::{StoreError, StoreResult};
pub use keys::{node_key, node_prefix, role_label, service_key, service_prefix, CONFIGURATION_KEY, ROOT};
pub use store::HaStore;
pub use timeouts::{alarmed_timeout, heartbeat_overtime};
pub use topology::Topology;
pub use updates::{NodeUpdate, ServiceUpdate};
