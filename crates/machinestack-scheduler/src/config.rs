//! Scheduler configuration.
//!
//! ```toml
//! scheduler = "cluster"
//! driver_port = 8443
//! state_path = "/var/lib/machinestack/machines.redb"
//!
//! [registry]
//! address = "127.0.0.1:8500"
//! timeout_secs = 5
//!
//! [driver_options]
//! "lxd.image_remote" = "images"
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use machinestack_driver::DriverOptions;
use machinestack_registry::consul::DEFAULT_CONSUL_ADDRESS;
use machinestack_state::{StateResult, StateStore};
use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;

/// Default port drivers are reached on at a selected node (LXD's HTTPS port).
pub const DEFAULT_DRIVER_PORT: u16 = 8443;

/// Which scheduler variant to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerKind {
    /// Every machine runs on this host.
    Local,
    /// Machines are spread over registry-discovered nodes.
    Cluster,
}

impl SchedulerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulerKind::Local => "local",
            SchedulerKind::Cluster => "cluster",
        }
    }
}

impl FromStr for SchedulerKind {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(SchedulerKind::Local),
            "cluster" | "consul" => Ok(SchedulerKind::Cluster),
            other => Err(SchedulerError::UnknownScheduler(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RegistryConfig {
    /// Consul agent `host:port`.
    pub address: String,
    /// ACL token, if the agent requires one.
    pub token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_CONSUL_ADDRESS.to_string(),
            token: None,
            timeout_secs: 5,
        }
    }
}

impl RegistryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// `local`, or `cluster` (alias `consul`).
    pub scheduler: String,
    pub registry: RegistryConfig,
    /// Port appended to a node's address to reach its driver.
    pub driver_port: u16,
    /// State store file; `None` keeps state in memory.
    pub state_path: Option<PathBuf>,
    /// Base options handed to every driver.
    pub driver_options: HashMap<String, String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerKind::Local.as_str().to_string(),
            registry: RegistryConfig::default(),
            driver_port: DEFAULT_DRIVER_PORT,
            state_path: None,
            driver_options: HashMap::new(),
        }
    }
}

impl SchedulerConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// The configured scheduler variant, failing on unknown names.
    pub fn kind(&self) -> Result<SchedulerKind, SchedulerError> {
        self.scheduler.parse()
    }

    pub fn driver_options(&self) -> DriverOptions {
        DriverOptions::new(self.driver_options.clone())
    }

    /// Open the configured state store.
    pub fn open_state(&self) -> StateResult<StateStore> {
        match &self.state_path {
            Some(path) => StateStore::open(path),
            None => StateStore::open_in_memory(),
        }
    }
}
