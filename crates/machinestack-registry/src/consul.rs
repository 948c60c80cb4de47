//! Consul agent client.
//!
//! Talks plain HTTP/1.1 to a local Consul agent using the two read-only
//! endpoints the scheduler needs:
//!
//! - `GET /v1/health/service/<service>?passing=true`
//! - `GET /v1/catalog/node/<node>`

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{RegistryError, RegistryResult};
use crate::registry::ServiceRegistry;
use crate::types::{CatalogNode, ServiceEntry};

/// Default Consul agent HTTP address.
pub const DEFAULT_CONSUL_ADDRESS: &str = "127.0.0.1:8500";

/// Registry backed by a Consul agent's HTTP API.
#[derive(Debug, Clone)]
pub struct ConsulRegistry {
    /// Agent `host:port`.
    address: String,
    /// ACL token sent as `X-Consul-Token`.
    token: Option<String>,
    timeout: Duration,
}

impl ConsulRegistry {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            token: None,
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> RegistryResult<T> {
        tokio::time::timeout(self.timeout, self.fetch(path))
            .await
            .map_err(|_| RegistryError::Timeout(self.timeout))?
    }

    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> RegistryResult<T> {
        let stream = tokio::net::TcpStream::connect(&self.address)
            .await
            .map_err(|e| RegistryError::Request(format!("connect {}: {e}", self.address)))?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| RegistryError::Request(format!("handshake with {}: {e}", self.address)))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "registry connection closed with error");
            }
        });

        let mut builder = http::Request::builder()
            .method("GET")
            .uri(path)
            .header("host", &self.address)
            .header("accept", "application/json")
            .header("user-agent", "machinestack-registry/0.1");
        if let Some(token) = &self.token {
            builder = builder.header("x-consul-token", token);
        }
        let request = builder
            .body(Empty::<Bytes>::new())
            .map_err(|e| RegistryError::Request(e.to_string()))?;

        let response = sender
            .send_request(request)
            .await
            .map_err(|e| RegistryError::Request(format!("GET {path}: {e}")))?;
        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| RegistryError::Request(format!("reading body of GET {path}: {e}")))?
            .to_bytes();

        if !status.is_success() {
            return Err(RegistryError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).trim().to_string(),
            });
        }

        debug!(%path, bytes = body.len(), "registry response received");
        serde_json::from_slice(&body).map_err(|e| RegistryError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ServiceRegistry for ConsulRegistry {
    async fn healthy_instances(&self, service: &str) -> RegistryResult<Vec<ServiceEntry>> {
        let path = format!("/v1/health/service/{}?passing=true", urlencoding::encode(service));
        let entries: Vec<HealthEntry> = self.get_json(&path).await?;
        Ok(entries
            .into_iter()
            .map(|e| ServiceEntry {
                service: e.service.map(|s| s.service).unwrap_or_else(|| service.to_string()),
                node: e.node.into(),
            })
            .collect())
    }

    async fn node(&self, node_id: &str) -> RegistryResult<Option<CatalogNode>> {
        let path = format!("/v1/catalog/node/{}", urlencoding::encode(node_id));
        // Consul answers `null` for unknown nodes.
        let found: Option<NodeServices> = self.get_json(&path).await?;
        Ok(found.map(|n| n.node.into()))
    }
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ConsulNode {
    #[serde(rename = "ID", default)]
    id: String,
    #[serde(rename = "Node")]
    name: String,
    #[serde(rename = "Address", default)]
    address: String,
    #[serde(rename = "Meta", default)]
    meta: Option<HashMap<String, String>>,
}

impl From<ConsulNode> for CatalogNode {
    fn from(node: ConsulNode) -> Self {
        // Agents without a node ID are addressed by name.
        let id = if node.id.is_empty() {
            node.name.clone()
        } else {
            node.id
        };
        CatalogNode {
            id,
            name: node.name,
            address: node.address,
            meta: node.meta.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConsulService {
    #[serde(rename = "Service")]
    service: String,
}

#[derive(Debug, Deserialize)]
struct HealthEntry {
    #[serde(rename = "Node")]
    node: ConsulNode,
    #[serde(rename = "Service", default)]
    service: Option<ConsulService>,
}

#[derive(Debug, Deserialize)]
struct NodeServices {
    #[serde(rename = "Node")]
    node: ConsulNode,
}
