//! Engine configuration

use serde::{Deserialize, Serialize};

use crate::batch::DEFAULT_BATCH_CEILING;
use crate::identity::{StoreIdentityBuilder, DEFAULT_KEY_PATH};
use crate::storage::{StoreError, StoreResult};

/// Settings shared by every store an engine serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Most records one `get-batch` call returns. Changes round trips, never results.
    pub batch_ceiling: usize,
    /// Key path for stores created without an explicit one.
    pub default_key_path: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_ceiling: DEFAULT_BATCH_CEILING,
            default_key_path: DEFAULT_KEY_PATH.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn batch_ceiling(mut self, ceiling: usize) -> Self {
        self.batch_ceiling = ceiling;
        self
    }

    /// Identity builder preset with this config's default key path.
    pub fn identity(&self, database: impl Into<String>) -> StoreIdentityBuilder {
        StoreIdentityBuilder::new(database).key_path(self.default_key_path.clone())
    }

    /// Reject settings no engine can honor.
    pub fn validate(&self) -> StoreResult<()> {
        if self.batch_ceiling == 0 {
            return Err(StoreError::InvalidData(
                "batch ceiling must be at least 1".into(),
            ));
        }
        if self.default_key_path.is_empty() {
            return Err(StoreError::InvalidData("default key path is empty".into()));
        }
        Ok(())
    }

    /// Parse and validate a JSON config; missing fields take defaults.
    pub fn from_json(json: &str) -> StoreResult<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}
