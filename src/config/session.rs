use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Timeouts governing the coordination session and every bounded wait
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionConfig {
    /// How long a disconnected session may stay silent before it is treated
    /// as expired and a fresh connect is attempted
    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u64,

    /// Deadline of a single connect attempt
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Deadline of a single read/list/write against the coordination service
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Bounded wait of facade operations for the `Connected` state
    #[serde(default = "default_wait_connected_timeout_ms")]
    pub wait_connected_timeout_ms: u64,

    /// Bounded wait of `start()` for the initial load
    #[serde(default = "default_startup_timeout_ms")]
    pub startup_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_timeout_ms: default_session_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            wait_connected_timeout_ms: default_wait_connected_timeout_ms(),
            startup_timeout_ms: default_startup_timeout_ms(),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("session_timeout_ms", self.session_timeout_ms),
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("request_timeout_ms", self.request_timeout_ms),
            ("wait_connected_timeout_ms", self.wait_connected_timeout_ms),
            ("startup_timeout_ms", self.startup_timeout_ms),
        ] {
            if value == 0 {
                return Err(Error::Config(ConfigError::Message(format!(
                    "{name} must be greater than 0"
                ))));
            }
        }

        if self.connect_timeout_ms > self.startup_timeout_ms {
            return Err(Error::Config(ConfigError::Message(format!(
                "connect_timeout_ms {}ms should not exceed startup_timeout_ms {}ms",
                self.connect_timeout_ms, self.startup_timeout_ms
            ))));
        }

        Ok(())
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn wait_connected_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_connected_timeout_ms)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }
}

fn default_session_timeout_ms() -> u64 {
    10_000
}
fn default_connect_timeout_ms() -> u64 {
    3_000
}
fn default_request_timeout_ms() -> u64 {
    2_000
}
fn default_wait_connected_timeout_ms() -> u64 {
    5_000
}
fn default_startup_timeout_ms() -> u64 {
    30_000
}
