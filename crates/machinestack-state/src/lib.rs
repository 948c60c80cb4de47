//! machinestack-state — machine ownership store.
//!
//! Backed by [redb](https://docs.rs/redb), records which node and driver
//! own each provisioned machine. A record exists for a machine name if and
//! only if that machine is currently provisioned somewhere in the fleet.
//!
//! # Architecture
//!
//! Records are JSON-serialized into redb's `&[u8]` value column under
//! `machine:<name>` keys, so a prefix scan over `machine:` lists every
//! provisioned machine.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and is shared across concurrent scheduler operations.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
