use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Watch dispatch configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WatchConfig {
    /// Capacity of each per-entity-type dispatch queue
    #[serde(default = "default_dispatch_queue_size")]
    pub dispatch_queue_size: usize,

    /// How long an `update_*` call waits for its value to be applied locally
    /// after the coordination service acknowledged the write
    #[serde(default = "default_apply_timeout_ms")]
    pub apply_timeout_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            dispatch_queue_size: default_dispatch_queue_size(),
            apply_timeout_ms: default_apply_timeout_ms(),
        }
    }
}

impl WatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.dispatch_queue_size == 0 {
            return Err(Error::Config(ConfigError::Message(
                "dispatch_queue_size must be > 0".into(),
            )));
        }
        if self.apply_timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "apply_timeout_ms must be > 0".into(),
            )));
        }
        Ok(())
    }

    pub fn apply_timeout(&self) -> Duration {
        Duration::from_millis(self.apply_timeout_ms)
    }
}

fn default_dispatch_queue_size() -> usize {
    1024
}
fn default_apply_timeout_ms() -> u64 {
    5_000
}
