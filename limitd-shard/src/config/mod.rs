mod loader;
mod types;

pub use loader::{load_from_path, validate};
pub use types::{AutodiscoverConfig, Config, RecordType, ShardConfig};
