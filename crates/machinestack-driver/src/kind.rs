//! The closed set of driver kinds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DriverError;

/// A machine driver kind.
///
/// The kind name doubles as the service name that worker nodes advertise in
/// the service registry, so `lxd` nodes register an `lxd` service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverKind {
    Lxd,
}

impl DriverKind {
    /// Every supported kind.
    pub const ALL: [DriverKind; 1] = [DriverKind::Lxd];

    pub fn as_str(&self) -> &'static str {
        match self {
            DriverKind::Lxd => "lxd",
        }
    }

    /// Service name advertised in the registry by nodes running this driver.
    pub fn service_name(&self) -> &'static str {
        self.as_str()
    }

    /// Option key carrying the remote endpoint a driver instance is bound to.
    pub fn remote_option_key(&self) -> String {
        format!("{}.remote", self.as_str())
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DriverKind {
    type Err = DriverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| DriverError::UnknownDriver(s.to_string()))
    }
}
