use std::fmt;

use crate::error::{Result, ShardError};

/// URL scheme of the protocol this layer targets.
pub const SCHEME: &str = "limitd";

/// Normalized endpoint of a single backend node.
///
/// Always renders as `limitd://<host>:<port>`. Built from a bare
/// hostname (default port applied), a `host:port` pair, or a full
/// `limitd://host:port` URL taken as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeAddress {
    host: String,
    port: u16,
}

impl NodeAddress {
    /// Normalize a raw host string into a full node address.
    pub fn from_host(raw: &str, default_port: u16) -> Result<Self> {
        let rest = raw.strip_prefix("limitd://").unwrap_or(raw);
        if rest.is_empty() {
            return Err(ShardError::Config(format!("empty host in {raw:?}")));
        }

        // Bare IPv6 addresses contain colons that are not port separators.
        if rest.parse::<std::net::Ipv6Addr>().is_ok() {
            return Ok(Self { host: rest.to_string(), port: default_port });
        }

        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| ShardError::Config(format!("invalid port in {raw:?}")))?;
                (host, port)
            }
            _ => (rest, default_port),
        };

        if !valid_host(host) {
            return Err(ShardError::Config(format!("invalid host in {raw:?}")));
        }

        Ok(Self { host: host.to_string(), port })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

/// Canonicalize a raw host list: sort the raw strings lexicographically,
/// then normalize each. Sorting before mapping keeps routing indices
/// reproducible for the same member set regardless of discovery order.
pub fn canonicalize(hosts: &[String], default_port: u16) -> Result<Vec<NodeAddress>> {
    let mut sorted: Vec<&String> = hosts.iter().collect();
    sorted.sort();
    sorted
        .into_iter()
        .map(|h| NodeAddress::from_host(h, default_port))
        .collect()
}

fn valid_host(host: &str) -> bool {
    !host.is_empty()
        && host.len() <= 253
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        && !host.starts_with('.')
        && !host.ends_with('.')
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}://{}:{}", self.host, self.port)
    }
}
