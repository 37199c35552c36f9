use serde::{Deserialize, Serialize};

use crate::error::{LatencyError, StoreError, ValidationError};
use crate::store::{AggregateStore, Keys};

/// Process-wide switch for request instrumentation.
///
/// Read once when the router is built; saving new settings takes effect
/// on the next start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub enabled: bool,
}

impl Settings {
    /// Parse an admin-supplied payload. Unknown and missing fields are rejected.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(raw).map_err(|e| ValidationError::Settings(e.to_string()))
    }

    /// Load stored settings, defaulting to disabled when none were saved.
    pub async fn load(
        store: &dyn AggregateStore,
        keys: &Keys,
    ) -> Result<Self, StoreError> {
        let Some(raw) = store.get(&keys.settings).await? else {
            return Ok(Self::default());
        };
        serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt {
            key: keys.settings.clone(),
            reason: e.to_string(),
        })
    }

    /// Validate `raw` and overwrite the stored settings wholesale.
    pub async fn save(
        store: &dyn AggregateStore,
        keys: &Keys,
        raw: &str,
    ) -> Result<Self, LatencyError> {
        let settings = Self::parse(raw)?;
        let json = serde_json::to_string(&settings)
            .map_err(|e| ValidationError::Settings(e.to_string()))?;
        store.set(&keys.settings, &json).await?;
        tracing::info!(enabled = settings.enabled, "latency settings saved");
        Ok(settings)
    }
}
