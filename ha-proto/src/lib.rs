//! Wire and domain types shared by every `ha-*` crate: the `Node`/`Service`/
//! `Configuration` records that live in the coordination store, the fixed
//! service-mapping table, and the `Alarmable` capability used by the Fixer
//! and Switcher to debounce alerts without caring whether they're looking at
//! a node or a service.

mod alarmable;
mod configuration;
mod node;
mod service;
mod service_mapping;

pub use alarmable::{Alarmable, NodeAlarmable, ServiceAlarmable};
pub use configuration::Configuration;
pub use node::{Node, NodeRole, NodeStatus, NodeType, SwitchStatus};
pub use service::{Service, ServiceStatus};
pub use service_mapping::{service_mapping, ServiceDefinition};
