use async_trait::async_trait;
use tokio::net::lookup_host;
use tracing::debug;

use crate::config::RecordType;
use crate::error::{Result, ShardError};

/// Name resolution, abstracted so membership refresh can be driven by
/// any source of concrete addresses.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolve a logical address to an unordered list of concrete host
    /// strings.
    async fn resolve(&self, address: &str, record: RecordType) -> Result<Vec<String>>;
}

fn record_label(record: RecordType) -> &'static str {
    match record {
        RecordType::A => "A",
        RecordType::Aaaa => "AAAA",
    }
}

/// System DNS resolver backed by `tokio::net::lookup_host`.
#[derive(Debug, Default, Clone)]
pub struct DnsResolver;

#[async_trait]
impl Resolver for DnsResolver {
    async fn resolve(&self, address: &str, record: RecordType) -> Result<Vec<String>> {
        debug!("resolving {} records for {address}", record_label(record));
        let lookup = lookup_host((address, 0))
            .await
            .map_err(|e| ShardError::Discovery(format!("failed to resolve {address}: {e}")))?;

        let hosts: Vec<String> = lookup
            .filter(|sa| match record {
                RecordType::A => sa.is_ipv4(),
                RecordType::Aaaa => sa.is_ipv6(),
            })
            .map(|sa| sa.ip().to_string())
            .collect();

        if hosts.is_empty() {
            return Err(ShardError::Discovery(format!(
                "no {} records found for {address}",
                record_label(record)
            )));
        }

        Ok(hosts)
    }
}
