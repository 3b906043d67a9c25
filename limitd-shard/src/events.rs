use crate::addr::NodeAddress;
use crate::node::NodeEvent;

/// Capacity of the aggregate broadcast channel. Slow subscribers lag
/// rather than block emitters.
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Events re-emitted on the shard client.
///
/// Node signals keep their original payload and gain the originating
/// node's address so subscribers can attribute them. Signals firing on
/// two nodes are re-emitted twice, independently.
#[derive(Debug, Clone)]
pub enum ShardEvent {
    /// A signal forwarded from one node client
    Node {
        origin: NodeAddress,
        event: NodeEvent,
    },
    /// A discovery pass failed; the current topology is unchanged
    DiscoveryError { message: String },
    /// Discovery produced a different member set and the membership was
    /// rebuilt
    TopologyChanged { addresses: Vec<NodeAddress> },
}
