use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::addr::NodeAddress;
use crate::error::Result;

/// Outcome of a single quota operation, forwarded untouched from the
/// node that handled it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuotaResponse {
    pub conformant: bool,
    pub remaining: u64,
    pub limit: u64,
    /// Epoch milliseconds at which the bucket refills
    pub reset: u64,
    /// Set by `wait` when the node delayed the caller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delayed: Option<bool>,
}

/// One bucket instance reported by a node's status query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusItem {
    pub key: String,
    pub remaining: u64,
    pub limit: u64,
}

/// A single node's answer to a status query.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct StatusResponse {
    #[serde(default)]
    pub items: Vec<StatusItem>,
}

/// Lifecycle and response signals a node client may emit.
#[derive(Debug, Clone)]
pub enum NodeEvent {
    Error(String),
    BreakerError(String),
    Connect,
    Reconnect,
    Close,
    Ready,
    Response(serde_json::Value),
}

/// One connection/session to a single backend node.
///
/// The per-node protocol (reset/put/take/wait semantics, retries,
/// circuit breaking, timeouts) lives entirely behind this trait; the
/// sharding layer only routes to it and forwards results unchanged.
#[async_trait]
pub trait NodeClient: Send + Sync {
    async fn reset(&self, bucket_type: &str, key: &str, count: Option<u64>)
        -> Result<QuotaResponse>;
    async fn put(&self, bucket_type: &str, key: &str, count: Option<u64>) -> Result<QuotaResponse>;
    async fn take(&self, bucket_type: &str, key: &str, count: Option<u64>)
        -> Result<QuotaResponse>;
    async fn wait(&self, bucket_type: &str, key: &str, count: Option<u64>)
        -> Result<QuotaResponse>;

    async fn status(&self, bucket_type: &str, prefix: &str) -> Result<StatusResponse>;

    async fn ping(&self) -> Result<()>;

    /// Tear down the underlying connection. Called when the membership
    /// snapshot owning this client is replaced.
    fn disconnect(&self);

    /// Optional event-emission capability. Clients that emit nothing
    /// return `None` and the multiplexer skips wiring them.
    fn subscribe(&self) -> Option<broadcast::Receiver<NodeEvent>> {
        None
    }
}

/// Builds one `NodeClient` per membership address.
///
/// `params` carries every configuration key the sharding layer does not
/// recognize, verbatim.
pub trait NodeClientFactory: Send + Sync + 'static {
    fn create(&self, address: &NodeAddress, params: &toml::Table) -> Arc<dyn NodeClient>;
}
