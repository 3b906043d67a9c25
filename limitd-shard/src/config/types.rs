use serde::Deserialize;

/// DNS record type used by autodiscover lookups
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    /// IPv4 addresses (default)
    #[default]
    A,
    /// IPv6 addresses
    Aaaa,
}

/// Autodiscover (DNS-based) membership configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AutodiscoverConfig {
    /// Logical DNS name resolved on every refresh tick
    /// Example: "limitd.internal.example.com"
    pub address: String,
    /// Record type to resolve
    /// Default: "A"
    #[serde(default)]
    pub record: RecordType,
    /// Refresh period in seconds, fixed regardless of outcome
    /// Default: 300 (5 minutes)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

/// Shard membership configuration
///
/// Exactly one of `hosts` (static) or `autodiscover` (dynamic) must be
/// set; construction fails otherwise.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct ShardConfig {
    /// Static host list; order is irrelevant (canonicalized by sorting)
    /// Entries may be bare hosts, "host:port", or full "limitd://host:port"
    #[serde(default)]
    pub hosts: Option<Vec<String>>,
    /// Dynamic membership via periodic DNS resolution
    #[serde(default)]
    pub autodiscover: Option<AutodiscoverConfig>,
}

/// Top-level shard client configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Default port applied to hosts that do not carry one
    /// Default: 9231
    #[serde(default = "default_port")]
    pub port: u16,
    /// Membership configuration (required)
    #[serde(default)]
    pub shard: ShardConfig,
    /// Everything else is passed through verbatim to every node client
    /// constructor (connection options, timeouts, protocol settings)
    #[serde(flatten)]
    pub params: toml::Table,
}

impl Config {
    /// Static-host config with defaults for everything else.
    pub fn with_hosts<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            port: default_port(),
            shard: ShardConfig {
                hosts: Some(hosts.into_iter().map(Into::into).collect()),
                autodiscover: None,
            },
            params: toml::Table::new(),
        }
    }

    /// Autodiscover config with defaults for everything else.
    pub fn with_autodiscover(address: impl Into<String>) -> Self {
        Self {
            port: default_port(),
            shard: ShardConfig {
                hosts: None,
                autodiscover: Some(AutodiscoverConfig {
                    address: address.into(),
                    record: RecordType::A,
                    interval_secs: default_interval_secs(),
                }),
            },
            params: toml::Table::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            shard: ShardConfig::default(),
            params: toml::Table::new(),
        }
    }
}

pub(crate) fn default_port() -> u16 {
    9231
}

pub(crate) fn default_interval_secs() -> u64 {
    300
}
