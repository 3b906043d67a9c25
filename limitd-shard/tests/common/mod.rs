#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use limitd_shard::{
    NodeAddress, NodeClient, NodeClientFactory, NodeEvent, QuotaResponse, RecordType, Resolver,
    Result, ShardError, StatusItem, StatusResponse,
};

pub type CallLog = Arc<Mutex<Vec<String>>>;

/// Opt-in log output for debugging test runs (`RUST_LOG=debug`).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn granted() -> QuotaResponse {
    QuotaResponse { conformant: true, remaining: 9, limit: 10, reset: 0, delayed: None }
}

/// Shared state for a cluster of mock nodes. Acts as the
/// `NodeClientFactory` handed to the shard client and records
/// everything the nodes are asked to do.
#[derive(Default)]
pub struct MockCluster {
    /// Addresses in creation order
    created: Mutex<Vec<String>>,
    /// Every operation invoked on any node
    calls: Mutex<Vec<String>>,
    disconnects: AtomicUsize,
    fail_status_on: Mutex<Vec<String>>,
    status_delays_ms: Mutex<HashMap<String, u64>>,
    ping_delays_ms: Mutex<HashMap<String, u64>>,
    emit_events: bool,
    no_events_on: Mutex<Vec<String>>,
    event_senders: Mutex<HashMap<String, broadcast::Sender<NodeEvent>>>,
    params_seen: Mutex<Vec<toml::Table>>,
}

impl MockCluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_events() -> Arc<Self> {
        Arc::new(Self { emit_events: true, ..Default::default() })
    }

    pub fn created(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Make `status` on the node at `address` fail with `message`.
    pub fn fail_status(&self, address: &str, message: &str) {
        self.fail_status_on
            .lock()
            .unwrap()
            .push(format!("{address}={message}"));
    }

    pub fn set_status_delay(&self, address: &str, ms: u64) {
        self.status_delays_ms
            .lock()
            .unwrap()
            .insert(address.to_string(), ms);
    }

    pub fn set_ping_delay(&self, address: &str, ms: u64) {
        self.ping_delays_ms
            .lock()
            .unwrap()
            .insert(address.to_string(), ms);
    }

    /// Opt the node at `address` out of event emission.
    pub fn disable_events(&self, address: &str) {
        self.no_events_on.lock().unwrap().push(address.to_string());
    }

    /// Event sender for a created node, to fire signals from tests.
    pub fn sender_for(&self, address: &str) -> Option<broadcast::Sender<NodeEvent>> {
        self.event_senders.lock().unwrap().get(address).cloned()
    }

    /// Pass-through connection options received at each creation.
    pub fn params_seen(&self) -> Vec<toml::Table> {
        self.params_seen.lock().unwrap().clone()
    }

    fn status_failure(&self, address: &str) -> Option<String> {
        self.fail_status_on
            .lock()
            .unwrap()
            .iter()
            .find_map(|entry| {
                entry
                    .strip_prefix(address)
                    .and_then(|rest| rest.strip_prefix('='))
                    .map(str::to_string)
            })
    }
}

/// Newtype handle so the foreign `NodeClientFactory` trait can be
/// implemented for a shared `MockCluster` (orphan rule forbids
/// implementing it for `Arc<MockCluster>` directly).
pub struct MockFactory(pub Arc<MockCluster>);

impl NodeClientFactory for MockFactory {
    fn create(&self, address: &NodeAddress, params: &toml::Table) -> Arc<dyn NodeClient> {
        let cluster = &self.0;
        let rendered = address.to_string();
        cluster.created.lock().unwrap().push(rendered.clone());
        cluster.params_seen.lock().unwrap().push(params.clone());

        let events = if cluster.emit_events
            && !cluster.no_events_on.lock().unwrap().contains(&rendered)
        {
            let (tx, _) = broadcast::channel(16);
            cluster
                .event_senders
                .lock()
                .unwrap()
                .insert(rendered.clone(), tx.clone());
            Some(tx)
        } else {
            None
        };

        Arc::new(MockNode { address: rendered, cluster: Arc::clone(cluster), events })
    }
}

pub struct MockNode {
    address: String,
    cluster: Arc<MockCluster>,
    events: Option<broadcast::Sender<NodeEvent>>,
}

impl MockNode {
    fn record(&self, op: &str, bucket_type: &str, key: &str, count: Option<u64>) {
        self.cluster.calls.lock().unwrap().push(format!(
            "{op} {bucket_type}:{key} count={count:?} @ {}",
            self.address
        ));
    }
}

#[async_trait]
impl NodeClient for MockNode {
    async fn reset(
        &self,
        bucket_type: &str,
        key: &str,
        count: Option<u64>,
    ) -> Result<QuotaResponse> {
        self.record("reset", bucket_type, key, count);
        Ok(granted())
    }

    async fn put(&self, bucket_type: &str, key: &str, count: Option<u64>) -> Result<QuotaResponse> {
        self.record("put", bucket_type, key, count);
        Ok(granted())
    }

    async fn take(
        &self,
        bucket_type: &str,
        key: &str,
        count: Option<u64>,
    ) -> Result<QuotaResponse> {
        self.record("take", bucket_type, key, count);
        Ok(granted())
    }

    async fn wait(
        &self,
        bucket_type: &str,
        key: &str,
        count: Option<u64>,
    ) -> Result<QuotaResponse> {
        self.record("wait", bucket_type, key, count);
        Ok(granted())
    }

    async fn status(&self, bucket_type: &str, prefix: &str) -> Result<StatusResponse> {
        let delay = self
            .cluster
            .status_delays_ms
            .lock()
            .unwrap()
            .get(&self.address)
            .copied()
            .unwrap_or(0);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        self.cluster
            .calls
            .lock()
            .unwrap()
            .push(format!("status {bucket_type} {prefix} @ {}", self.address));

        if let Some(message) = self.cluster.status_failure(&self.address) {
            return Err(ShardError::Node(message));
        }

        Ok(StatusResponse {
            items: vec![
                StatusItem { key: format!("item1-from-{}", self.address), remaining: 5, limit: 10 },
                StatusItem { key: format!("item2-from-{}", self.address), remaining: 3, limit: 10 },
            ],
        })
    }

    async fn ping(&self) -> Result<()> {
        let delay = self
            .cluster
            .ping_delays_ms
            .lock()
            .unwrap()
            .get(&self.address)
            .copied()
            .unwrap_or(0);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.cluster
            .calls
            .lock()
            .unwrap()
            .push(format!("ping @ {}", self.address));
        Ok(())
    }

    fn disconnect(&self) {
        self.cluster.disconnects.fetch_add(1, Ordering::SeqCst);
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<NodeEvent>> {
        self.events.as_ref().map(|tx| tx.subscribe())
    }
}

/// Resolver that replays a scripted sequence of responses; once the
/// script is exhausted the last response repeats.
pub struct ScriptedResolver {
    responses: Mutex<VecDeque<std::result::Result<Vec<String>, String>>>,
    last: Mutex<Option<std::result::Result<Vec<String>, String>>>,
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl ScriptedResolver {
    pub fn new(responses: Vec<std::result::Result<Vec<String>, String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            last: Mutex::new(None),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Handle to the (address, record type) log, usable after the
    /// resolver has been moved into the shard client.
    pub fn call_log(&self) -> Arc<Mutex<Vec<(String, String)>>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Resolver for ScriptedResolver {
    async fn resolve(&self, address: &str, record: RecordType) -> Result<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .push((address.to_string(), format!("{record:?}")));

        let next = self.responses.lock().unwrap().pop_front();
        let response = match next {
            Some(r) => {
                *self.last.lock().unwrap() = Some(r.clone());
                r
            }
            None => self
                .last
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| Err("resolver script exhausted".to_string())),
        };

        response.map_err(ShardError::Discovery)
    }
}
