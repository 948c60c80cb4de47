//! Driver factory — the single place that branches on driver kind.

use std::sync::Arc;

use tracing::debug;

use crate::driver::Driver;
use crate::error::DriverResult;
use crate::kind::DriverKind;
use crate::lxd::LxdDriver;
use crate::options::DriverOptions;

/// Constructs drivers from a kind and a merged option map.
pub trait DriverFactory: Send + Sync {
    fn new_driver(&self, kind: DriverKind, options: DriverOptions) -> DriverResult<Arc<dyn Driver>>;

    /// Construct a driver from a kind name, failing with
    /// [`DriverError::UnknownDriver`](crate::DriverError::UnknownDriver)
    /// before anything is built.
    fn new_driver_named(&self, kind: &str, options: DriverOptions) -> DriverResult<Arc<dyn Driver>> {
        let kind: DriverKind = kind.parse()?;
        self.new_driver(kind, options)
    }
}

/// Factory for the drivers compiled into this crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeDriverFactory;

impl DriverFactory for NativeDriverFactory {
    fn new_driver(&self, kind: DriverKind, options: DriverOptions) -> DriverResult<Arc<dyn Driver>> {
        debug!(%kind, remote = ?options.remote(kind), "constructing driver");
        match kind {
            DriverKind::Lxd => Ok(Arc::new(LxdDriver::from_options(&options)?)),
        }
    }
}
