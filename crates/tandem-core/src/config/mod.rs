//! Engine settings schemas.
//!
//! Settings are deserialized from TOML files via the `config` crate. They
//! cover everything that can be expressed as data; hooks, transforms, and
//! store instances are layered on programmatically by `tandem-engine`.

pub mod execution;
pub mod logging;
pub mod store;
pub mod streams;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

use self::execution::ExecutionOrderTable;
use self::logging::LoggingConfig;
use self::store::StoreSettings;
use self::streams::StreamSettings;

use crate::error::AppError;
use crate::types::OnErrorPolicy;

/// Root settings.
///
/// The top-level deserialization target for the merged TOML files
/// (default.toml + environment overlay) and `TANDEM__*` variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct EngineSettings {
    /// Global error policy, used when neither module nor call sets one.
    #[serde(default)]
    pub on_error: OnErrorPolicy,
    /// Global execution order per action or action type.
    #[serde(default)]
    pub execution_order: ExecutionOrderTable,
    /// Stores to build, keyed by store name.
    #[serde(default)]
    #[validate(nested)]
    pub stores: BTreeMap<String, StoreSettings>,
    /// Open-stream registry settings.
    #[serde(default)]
    pub streams: StreamSettings,
    /// Logging settings.
    #[serde(default)]
    #[validate(nested)]
    pub logging: LoggingConfig,
}

impl EngineSettings {
    /// Load settings from TOML files.
    ///
    /// Merges `{dir}/default.toml` with an environment-specific overlay
    /// `{dir}/{env}.toml` and environment variables prefixed with `TANDEM`.
    pub fn load(dir: &str, env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(&format!("{dir}/default")).required(false))
            .add_source(config::File::with_name(&format!("{dir}/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("TANDEM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build settings: {e}")))?;

        let settings: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize settings: {e}")))?;
        settings.check()?;
        Ok(settings)
    }

    /// Validates field constraints and cross-references.
    pub fn check(&self) -> Result<(), AppError> {
        self.validate()?;
        if let Some(missing) = self
            .execution_order
            .store_names()
            .find(|name| !self.stores.contains_key(*name))
        {
            return Err(AppError::configuration(format!(
                "Execution order references store '{missing}' \
                 which has no [stores.{missing}] section"
            )));
        }
        Ok(())
    }
}
