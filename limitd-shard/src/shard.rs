use std::sync::{Arc, Mutex};
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::broadcast;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::addr::{self, NodeAddress};
use crate::config::{self, Config, RecordType};
use crate::discovery::{DnsResolver, Resolver};
use crate::error::{Result, ShardError};
use crate::events::{ShardEvent, EVENT_CHANNEL_CAPACITY};
use crate::hash::murmur3_32;
use crate::membership::Membership;
use crate::node::{NodeClient, NodeClientFactory, QuotaResponse, StatusItem};

/// Aggregate result of a cluster-wide status query.
///
/// `items` concatenates per-node responses in membership order; `errors`
/// holds one entry per node whose query failed, message preserved.
#[derive(Debug, Clone, Default)]
pub struct ShardStatus {
    pub items: Vec<StatusItem>,
    pub errors: Vec<ShardError>,
}

/// Per-node outcome of a cluster-wide ping, in membership order.
#[derive(Debug, Clone)]
pub struct PingOutcome {
    pub address: NodeAddress,
    pub error: Option<ShardError>,
}

/// Client-side sharding layer over a set of independent limitd nodes.
///
/// Deterministically routes per-key quota operations to the node owning
/// the key (murmur3 of `"<type>:<key>"` mod member count), keeps the
/// member set current (static list or periodic DNS discovery), re-emits
/// node events tagged with their origin, and aggregates status queries
/// across the whole cluster.
pub struct ShardClient {
    membership: Arc<ArcSwap<Membership>>,
    events: broadcast::Sender<ShardEvent>,
    refresh: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for ShardClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardClient").finish_non_exhaustive()
    }
}

impl ShardClient {
    /// Build a shard client using the system DNS resolver for
    /// autodiscover configs.
    pub async fn new(config: Config, factory: impl NodeClientFactory) -> Result<Self> {
        Self::with_resolver(config, factory, DnsResolver).await
    }

    /// Build a shard client with a caller-supplied resolver.
    pub async fn with_resolver(
        config: Config,
        factory: impl NodeClientFactory,
        resolver: impl Resolver + 'static,
    ) -> Result<Self> {
        config::validate(&config)?;

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let factory: Arc<dyn NodeClientFactory> = Arc::new(factory);

        if let Some(hosts) = &config.shard.hosts {
            let addresses = addr::canonicalize(hosts, config.port)?;
            info!("static shard membership: {} nodes", addresses.len());
            let membership =
                Membership::build(addresses, factory.as_ref(), &config.params, &events);
            return Ok(Self {
                membership: Arc::new(ArcSwap::from_pointee(membership)),
                events,
                refresh: Mutex::new(None),
            });
        }

        let auto = config
            .shard
            .autodiscover
            .clone()
            .ok_or_else(|| ShardError::Config("shard requires either hosts or autodiscover".to_string()))?;

        let membership = Arc::new(ArcSwap::from_pointee(Membership::empty()));
        let task = RefreshTask {
            membership: Arc::clone(&membership),
            events: events.clone(),
            factory,
            resolver: Arc::new(resolver),
            address: auto.address,
            record: auto.record,
            port: config.port,
            params: config.params,
        };

        let mut last_observed = Vec::new();
        task.tick(&mut last_observed).await;

        let interval = Duration::from_secs(auto.interval_secs);
        let handle = tokio::spawn(task.run(interval, last_observed));

        Ok(Self { membership, events, refresh: Mutex::new(Some(handle)) })
    }

    /// Subscribe to node events (tagged with their origin), discovery
    /// errors and topology changes.
    pub fn subscribe(&self) -> broadcast::Receiver<ShardEvent> {
        self.events.subscribe()
    }

    /// Addresses of the current membership, in routing order.
    pub fn addresses(&self) -> Vec<NodeAddress> {
        self.membership.load().addresses().to_vec()
    }

    /// Number of nodes in the current membership.
    pub fn node_count(&self) -> usize {
        self.membership.load().len()
    }

    /// Address of the node a (type, key) pair routes to, given the
    /// current membership.
    pub fn destination(&self, bucket_type: &str, key: &str) -> Result<NodeAddress> {
        let snapshot = self.membership.load();
        let index = route_index(bucket_type, key, snapshot.len())?;
        Ok(snapshot.addresses()[index].clone())
    }

    pub async fn reset(
        &self,
        bucket_type: &str,
        key: &str,
        count: Option<u64>,
    ) -> Result<QuotaResponse> {
        self.route(bucket_type, key)?.reset(bucket_type, key, count).await
    }

    pub async fn put(
        &self,
        bucket_type: &str,
        key: &str,
        count: Option<u64>,
    ) -> Result<QuotaResponse> {
        self.route(bucket_type, key)?.put(bucket_type, key, count).await
    }

    pub async fn take(
        &self,
        bucket_type: &str,
        key: &str,
        count: Option<u64>,
    ) -> Result<QuotaResponse> {
        self.route(bucket_type, key)?.take(bucket_type, key, count).await
    }

    pub async fn wait(
        &self,
        bucket_type: &str,
        key: &str,
        count: Option<u64>,
    ) -> Result<QuotaResponse> {
        self.route(bucket_type, key)?.wait(bucket_type, key, count).await
    }

    /// Query every node for its bucket instances and merge the answers.
    ///
    /// A failing node contributes one entry to `errors` and nothing to
    /// `items`; it does not abort the query. Items are appended in
    /// membership order regardless of which node answers first.
    pub async fn status(&self, bucket_type: &str, prefix: &str) -> Result<ShardStatus> {
        let snapshot = self.membership.load_full();

        let mut set = JoinSet::new();
        for (index, client) in snapshot.clients().iter().enumerate() {
            let client = Arc::clone(client);
            let bucket_type = bucket_type.to_string();
            let prefix = prefix.to_string();
            set.spawn(async move { (index, client.status(&bucket_type, &prefix).await) });
        }

        let mut slots = vec![None; snapshot.len()];
        while let Some(joined) = set.join_next().await {
            let (index, outcome) = joined.map_err(|e| ShardError::FanOut(e.to_string()))?;
            slots[index] = Some(outcome);
        }

        let mut status = ShardStatus::default();
        for slot in slots {
            match slot {
                Some(Ok(response)) => status.items.extend(response.items),
                Some(Err(e)) => status.errors.push(e),
                None => return Err(ShardError::FanOut("fan-out slot never completed".to_string())),
            }
        }
        Ok(status)
    }

    /// Ping every node concurrently; outcomes are reported in
    /// membership order even when pings complete out of order.
    pub async fn ping(&self) -> Result<Vec<PingOutcome>> {
        let snapshot = self.membership.load_full();

        let mut set = JoinSet::new();
        for (index, client) in snapshot.clients().iter().enumerate() {
            let client = Arc::clone(client);
            set.spawn(async move { (index, client.ping().await) });
        }

        let mut slots = vec![None; snapshot.len()];
        while let Some(joined) = set.join_next().await {
            let (index, outcome) = joined.map_err(|e| ShardError::FanOut(e.to_string()))?;
            slots[index] = Some(outcome);
        }

        let mut outcomes = Vec::with_capacity(snapshot.len());
        for (address, slot) in snapshot.addresses().iter().zip(slots) {
            let error = match slot {
                Some(Ok(())) => None,
                Some(Err(e)) => Some(e),
                None => return Err(ShardError::FanOut("fan-out slot never completed".to_string())),
            };
            outcomes.push(PingOutcome { address: address.clone(), error });
        }
        Ok(outcomes)
    }

    /// Stop the discovery refresh loop and disconnect every node
    /// client. Quota operations after shutdown fail with `NoMembers`;
    /// fan-out operations report an empty membership.
    pub fn shutdown(&self) {
        if let Some(handle) = self.take_refresh_handle() {
            handle.abort();
        }
        let old = self.membership.swap(Arc::new(Membership::empty()));
        old.disconnect_all();
    }

    fn route(&self, bucket_type: &str, key: &str) -> Result<Arc<dyn NodeClient>> {
        let snapshot = self.membership.load();
        let index = route_index(bucket_type, key, snapshot.len())?;
        debug!("routing {bucket_type}:{key} to node {index}");
        Ok(Arc::clone(snapshot.client_at(index)))
    }

    fn take_refresh_handle(&self) -> Option<JoinHandle<()>> {
        let mut guard = self.refresh.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.take()
    }
}

impl Drop for ShardClient {
    fn drop(&mut self) {
        if let Some(handle) = self.take_refresh_handle() {
            handle.abort();
        }
    }
}

/// Deterministic routing: murmur3 of `"<type>:<key>"` mod member count.
fn route_index(bucket_type: &str, key: &str, members: usize) -> Result<usize> {
    if members == 0 {
        return Err(ShardError::NoMembers);
    }
    let routing_key = format!("{bucket_type}:{key}");
    Ok(murmur3_32(routing_key.as_bytes()) as usize % members)
}

/// Periodic membership refresh for autodiscover mode.
struct RefreshTask {
    membership: Arc<ArcSwap<Membership>>,
    events: broadcast::Sender<ShardEvent>,
    factory: Arc<dyn NodeClientFactory>,
    resolver: Arc<dyn Resolver>,
    address: String,
    record: RecordType,
    port: u16,
    params: toml::Table,
}

impl RefreshTask {
    async fn run(self, interval: Duration, mut last_observed: Vec<NodeAddress>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; the initial pass already
        // ran at construction.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            self.tick(&mut last_observed).await;
        }
    }

    /// One discovery pass. Failures leave the current topology intact;
    /// an unchanged result performs no disconnect, rebuild or event.
    async fn tick(&self, last_observed: &mut Vec<NodeAddress>) {
        let hosts = match self.resolver.resolve(&self.address, self.record).await {
            Ok(hosts) => hosts,
            Err(e) => {
                warn!("discovery failed for {}: {e}", self.address);
                let _ = self.events.send(ShardEvent::DiscoveryError { message: e.to_string() });
                return;
            }
        };

        let addresses = match addr::canonicalize(&hosts, self.port) {
            Ok(addresses) => addresses,
            Err(e) => {
                warn!("discovery for {} produced an unusable host list: {e}", self.address);
                let _ = self.events.send(ShardEvent::DiscoveryError { message: e.to_string() });
                return;
            }
        };

        if addresses == *last_observed {
            debug!("membership unchanged ({} nodes)", addresses.len());
            return;
        }

        info!("membership changed: {} nodes", addresses.len());
        *last_observed = addresses.clone();

        let old = self.membership.load_full();
        old.disconnect_all();

        let fresh =
            Membership::build(addresses.clone(), self.factory.as_ref(), &self.params, &self.events);
        self.membership.store(Arc::new(fresh));

        let _ = self.events.send(ShardEvent::TopologyChanged { addresses });
    }
}
