use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::error::{Result, ShardError};

pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<Config> {
    let txt = fs::read_to_string(p)
        .map_err(|e| ShardError::Config(format!("failed to read config file: {e}")))?;
    let cfg: Config = toml::from_str(&txt)
        .map_err(|e| ShardError::Config(format!("failed to parse config: {e}")))?;

    validate(&cfg)?;

    Ok(cfg)
}

/// Reject absent or ambiguous shard configuration. Runs at load time and
/// again at client construction for programmatically built configs.
pub fn validate(cfg: &Config) -> Result<()> {
    match (&cfg.shard.hosts, &cfg.shard.autodiscover) {
        (Some(_), Some(_)) => Err(ShardError::Config(
            "shard.hosts and shard.autodiscover are mutually exclusive".to_string(),
        )),
        (None, None) => Err(ShardError::Config(
            "shard requires either hosts or autodiscover".to_string(),
        )),
        (Some(hosts), None) => {
            if hosts.is_empty() {
                return Err(ShardError::Config("shard.hosts must not be empty".to_string()));
            }
            Ok(())
        }
        (None, Some(auto)) => {
            if auto.address.is_empty() {
                return Err(ShardError::Config(
                    "shard.autodiscover.address must not be empty".to_string(),
                ));
            }
            if auto.interval_secs == 0 {
                return Err(ShardError::Config(
                    "shard.autodiscover.interval_secs must be positive".to_string(),
                ));
            }
            Ok(())
        }
    }
}
