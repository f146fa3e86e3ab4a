//! Per-store settings for the stores the binary builds from configuration.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Settings for one configured store.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StoreSettings {
    /// Store type: only `"memory"` is built in.
    #[serde(default = "default_kind")]
    #[validate(length(min = 1))]
    pub kind: String,
    /// Simulated latency applied to every action, in milliseconds.
    #[serde(default)]
    #[validate(range(max = 60_000))]
    pub latency_ms: u64,
    /// Whether `insert` on a collection generates a document id.
    #[serde(default = "default_true")]
    pub generate_ids: bool,
    /// Interval between scripted stream emissions, in milliseconds.
    #[serde(default = "default_stream_interval")]
    #[validate(range(min = 1, max = 60_000))]
    pub stream_interval_ms: u64,
    /// Keep documents delivered by later stores during reads.
    #[serde(default)]
    pub cache_reads: bool,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            kind: default_kind(),
            latency_ms: 0,
            generate_ids: true,
            stream_interval_ms: default_stream_interval(),
            cache_reads: false,
        }
    }
}

fn default_kind() -> String {
    "memory".to_string()
}

fn default_true() -> bool {
    true
}

fn default_stream_interval() -> u64 {
    500
}
