use thiserror::Error;

/// Errors that can occur in the sharding layer
#[derive(Error, Debug, Clone)]
pub enum ShardError {
    #[error("shard configuration error: {0}")]
    Config(String),

    #[error("discovery error: {0}")]
    Discovery(String),

    #[error("fan-out failed: {0}")]
    FanOut(String),

    /// Error reported by a single node, passed through unmodified.
    #[error("{0}")]
    Node(String),

    #[error("no nodes in the current membership")]
    NoMembers,
}

pub type Result<T> = std::result::Result<T, ShardError>;
