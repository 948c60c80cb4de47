//! machinestack-scheduler — machine placement, ownership, and driver dispatch.
//!
//! The scheduler composes a node selector, the state store, and a driver
//! factory into three operations: create, delete, and interactive sessions.
//!
//! - The **cluster** variant picks a healthy node by weighted random choice
//!   and binds each driver to that node's address.
//! - The **local** variant skips selection and runs every driver against
//!   this host.
//!
//! # Architecture
//!
//! ```text
//! Scheduler::{Cluster, Local}
//!   ├── NameLocks (one create/delete per machine name at a time)
//!   ├── StateStore (machine:<name> → {image, driver, nodeID})
//!   ├── NodeSelector → ServiceRegistry (cluster only)
//!   └── DriverFactory → Arc<dyn Driver> bound to "<kind>.remote"
//! ```

pub mod cluster;
pub mod config;
pub mod error;
pub mod local;
pub mod locks;
pub mod scheduler;
mod session;

pub use cluster::ClusterScheduler;
pub use config::{RegistryConfig, SchedulerConfig, SchedulerKind};
pub use error::{SchedulerError, SchedulerResult};
pub use local::LocalScheduler;
pub use locks::NameLocks;
pub use scheduler::{Scheduler, build_scheduler};
