use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::addr::NodeAddress;
use crate::events::ShardEvent;
use crate::node::{NodeClient, NodeClientFactory};

/// Immutable snapshot of the current node set.
///
/// `addresses[i]` always corresponds to `clients[i]`. Snapshots are
/// replaced wholesale on topology change, never mutated, so a reader
/// holding one observes either the complete old set or the complete
/// new set.
pub(crate) struct Membership {
    addresses: Vec<NodeAddress>,
    clients: Vec<Arc<dyn NodeClient>>,
    forwarders: Vec<JoinHandle<()>>,
}

impl Membership {
    pub(crate) fn empty() -> Self {
        Self { addresses: Vec::new(), clients: Vec::new(), forwarders: Vec::new() }
    }

    /// Build one client per address and wire its events, if it emits
    /// any, into the aggregate channel tagged with the origin address.
    pub(crate) fn build(
        addresses: Vec<NodeAddress>,
        factory: &dyn NodeClientFactory,
        params: &toml::Table,
        events: &broadcast::Sender<ShardEvent>,
    ) -> Self {
        let mut clients = Vec::with_capacity(addresses.len());
        let mut forwarders = Vec::new();

        for address in &addresses {
            let client = factory.create(address, params);
            if let Some(rx) = client.subscribe() {
                forwarders.push(spawn_forwarder(address.clone(), rx, events.clone()));
            } else {
                debug!("node {address} does not emit events, skipping wiring");
            }
            clients.push(client);
        }

        Self { addresses, clients, forwarders }
    }

    pub(crate) fn len(&self) -> usize {
        self.clients.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub(crate) fn addresses(&self) -> &[NodeAddress] {
        &self.addresses
    }

    pub(crate) fn clients(&self) -> &[Arc<dyn NodeClient>] {
        &self.clients
    }

    pub(crate) fn client_at(&self, index: usize) -> &Arc<dyn NodeClient> {
        &self.clients[index]
    }

    /// Disconnect every client and stop forwarding its events. Called
    /// when this snapshot is superseded or the shard client shuts down.
    pub(crate) fn disconnect_all(&self) {
        for forwarder in &self.forwarders {
            forwarder.abort();
        }
        for client in &self.clients {
            client.disconnect();
        }
    }
}

impl Drop for Membership {
    fn drop(&mut self) {
        for forwarder in &self.forwarders {
            forwarder.abort();
        }
    }
}

fn spawn_forwarder(
    origin: NodeAddress,
    mut rx: broadcast::Receiver<crate::node::NodeEvent>,
    tx: broadcast::Sender<ShardEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let _ = tx.send(ShardEvent::Node { origin: origin.clone(), event });
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    debug!("event forwarder for {origin} lagged, missed {missed} events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
