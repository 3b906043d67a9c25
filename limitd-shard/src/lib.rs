#![forbid(unsafe_code)]

pub mod addr;
pub mod config;
pub mod discovery;
pub mod error;
pub mod events;
pub mod hash;
mod membership;
pub mod node;
pub mod shard;

pub use addr::NodeAddress;
pub use config::{load_from_path, AutodiscoverConfig, Config, RecordType, ShardConfig};
pub use discovery::{DnsResolver, Resolver};
pub use error::{Result, ShardError};
pub use events::ShardEvent;
pub use node::{
    NodeClient, NodeClientFactory, NodeEvent, QuotaResponse, StatusItem, StatusResponse,
};
pub use shard::{PingOutcome, ShardClient, ShardStatus};
