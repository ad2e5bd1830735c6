//! The agent binary's library half: bootstrap configuration, the `Agent`
//! struct that wires every `ha-*` crate together for one host, the
//! scheduler loop, and the log-level reload plumbing. Split out of
//! `main.rs` so integration tests (`tests/scenarios.rs`) can drive
//! `Agent::tick` directly against a `MemoryKvBackend` instead of spawning
//! the real binary.

pub mod agent;
pub mod config;
pub mod error;
pub mod logging;
pub mod scheduler;

pub use agent::Agent;
pub use config::BootstrapConfig;
pub use error::{ConfigError, TickError, TickResult};
pub use logging::LoggingReload;
