//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{PaydeskError, Result, constants};

/// Tunables for the settlement service.
///
/// Missing fields fall back to the defaults in [`constants`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How long a caller waits for a transaction's critical section.
    pub lock_timeout_ms: u64,
    /// Width of the duplicate-suppression recording bucket.
    pub dedup_bucket_secs: i64,
    /// Capacity of the event broadcast channel.
    pub event_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: constants::DEFAULT_LOCK_TIMEOUT_MS,
            dedup_bucket_secs: constants::DEFAULT_DEDUP_BUCKET_SECS,
            event_channel_capacity: constants::DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Parse from JSON and validate.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)
            .map_err(|e| PaydeskError::Configuration(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values that would disable a safety mechanism.
    pub fn validate(&self) -> Result<()> {
        if self.lock_timeout_ms == 0 {
            return Err(PaydeskError::Configuration(
                "lock_timeout_ms must be > 0".into(),
            ));
        }
        if self.dedup_bucket_secs <= 0 {
            return Err(PaydeskError::Configuration(
                "dedup_bucket_secs must be > 0".into(),
            ));
        }
        if self.event_channel_capacity == 0 {
            return Err(PaydeskError::Configuration(
                "event_channel_capacity must be > 0".into(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}
