//! Configuration management for the config directory.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support (`CONFIG_PATH`)
//! - Environment variable overrides (`CONFDIR__` prefix)
//! - Component-wise validation

mod cluster;
mod retry;
mod session;
mod watch;
pub use cluster::*;
pub use retry::*;
pub use session::*;
pub use watch::*;


use std::env;
use std::fmt::Debug;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Environment variable prefix for overrides, e.g. `CONFDIR__CLUSTER__CLUSTER_NAME`
pub const ENV_PREFIX: &str = "CONFDIR";

/// Main configuration container for a directory instance
///
/// Combines all subsystem configurations with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct DirectoryConfig {
    /// Cluster identity and coordination-service addresses
    #[serde(default)]
    pub cluster: ClusterSettings,
    /// Session and bounded-wait timeouts
    #[serde(default)]
    pub session: SessionConfig,
    /// Retry policies for coordination operations
    #[serde(default)]
    pub retry: RetryPolicies,
    /// Watch dispatch tuning
    #[serde(default)]
    pub watch: WatchConfig,
}

impl Debug for DirectoryConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("DirectoryConfig")
            .field("cluster", &self.cluster)
            .field("session", &self.session)
            .finish()
    }
}

impl DirectoryConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Configuration sources are merged in the following order (later sources override earlier):
    /// 1. Type defaults (lowest priority)
    /// 2. Configuration file from `CONFIG_PATH` environment variable (if set)
    /// 3. Environment variables with `CONFDIR__` prefix (highest priority)
    ///
    /// # Note
    /// Validation is deferred so further overrides can be applied via
    /// `with_override_config()`. Callers MUST call `validate()` before use.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("CONFDIR__CLUSTER__CLUSTER_NAME", "prod");
    /// let cfg = DirectoryConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(Self::env_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional configuration overrides from file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables (highest priority)
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(Self::env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates configuration and returns validated instance.
    pub fn validate(self) -> Result<Self> {
        self.cluster.validate()?;
        self.session.validate()?;
        self.retry.validate()?;
        self.watch.validate()?;
        Ok(self)
    }

    fn env_source() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("cluster.coordination_addrs")
            .ignore_empty(true)
            .try_parsing(true)
    }
}
