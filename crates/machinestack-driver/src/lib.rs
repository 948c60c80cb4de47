//! machinestack-driver — the contract between the scheduler and the
//! per-node machine drivers.
//!
//! A driver provisions, deprovisions, and opens interactive sessions on
//! machines of one kind (e.g. LXD containers). The scheduler never talks to
//! a concrete driver type: it asks a [`DriverFactory`] for a driver bound to
//! a [`DriverKind`] and a set of [`DriverOptions`], then drives it through
//! the [`Driver`] trait.
//!
//! # Architecture
//!
//! ```text
//! DriverFactory::new_driver(kind, options)
//!   └── Arc<dyn Driver>
//!       ├── create(name, image, attrs)
//!       ├── delete(name)
//!       └── session(name, streams, control, size)
//!              ├── stdin  ──▶ remote process
//!              ├── stdout ◀── remote process
//!              ├── stderr ◀── remote process
//!              └── control (Resize / Signal), any time mid-session
//! ```

pub mod driver;
pub mod error;
pub mod factory;
pub mod kind;
pub mod lxd;
pub mod options;
pub mod session;

pub use driver::{Driver, MachineAttributes};
pub use error::{DriverError, DriverResult};
pub use factory::{DriverFactory, NativeDriverFactory};
pub use kind::DriverKind;
pub use lxd::LxdDriver;
pub use options::DriverOptions;
pub use session::{ControlMessage, ControlReceiver, ControlSender, SessionStreams, TerminalSize};
