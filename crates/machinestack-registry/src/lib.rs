//! machinestack-registry — service discovery for the cluster scheduler.
//!
//! Worker nodes advertise one registry service per driver kind they can
//! host (an `lxd` node registers an `lxd` service). The scheduler treats the
//! registry as read-only: it asks for the healthy instances of a service
//! and resolves persisted node IDs back to addresses. It never stores
//! scheduler state in the registry.
//!
//! # Components
//!
//! - **`registry`** — the [`ServiceRegistry`] trait and an in-memory registry
//! - **`consul`** — HTTP client for a Consul agent
//! - **`weighted`** — pure weighted-choice functions
//! - **`selector`** — [`NodeSelector`], one weighted draw per call

pub mod consul;
pub mod error;
pub mod registry;
pub mod selector;
pub mod types;
pub mod weighted;

pub use consul::ConsulRegistry;
pub use error::{RegistryError, RegistryResult};
pub use registry::{MemoryRegistry, ServiceRegistry};
pub use selector::{NodeSelector, pick};
pub use types::{CatalogNode, ServiceEntry, WEIGHT_META_KEY};
pub use weighted::{choose_weighted, parse_weight, valid_weight, weighted_index};
