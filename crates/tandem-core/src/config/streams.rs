//! Open-stream registry settings.

use serde::{Deserialize, Serialize};

/// How the open-stream registry treats a key that is registered twice.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamSettings {
    /// Stop the streams of the replaced registration when a key is
    /// registered again. When `false` the older streams keep running but can
    /// no longer be stopped through the registry.
    #[serde(default)]
    pub stop_replaced: bool,
}
