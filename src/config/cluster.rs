use serde::Deserialize;
use serde::Serialize;

use config::ConfigError;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClusterSettings {
    /// Name of the cluster; every entity path lives under it
    #[serde(default = "default_cluster_name")]
    pub cluster_name: String,

    /// Coordination-service endpoints, e.g. `["zk1:2181", "zk2:2181"]`
    #[serde(default = "default_coordination_addrs")]
    pub coordination_addrs: Vec<String>,

    /// Root path of the directory tree inside the coordination service
    #[serde(default = "default_root_path")]
    pub root_path: String,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            cluster_name: default_cluster_name(),
            coordination_addrs: default_coordination_addrs(),
            root_path: default_root_path(),
        }
    }
}

impl ClusterSettings {
    /// Validates cluster identity
    /// # Errors
    /// Returns `Error::Config` if any configuration rules are violated
    pub fn validate(&self) -> Result<()> {
        if self.cluster_name.is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "cluster_name cannot be empty".into(),
            )));
        }

        if self.cluster_name.contains('/') {
            return Err(Error::Config(ConfigError::Message(format!(
                "cluster_name '{}' must not contain '/'",
                self.cluster_name
            ))));
        }

        if self.coordination_addrs.is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "coordination_addrs must contain at least one address".into(),
            )));
        }

        if let Some(addr) = self.coordination_addrs.iter().find(|a| a.trim().is_empty()) {
            return Err(Error::Config(ConfigError::Message(format!(
                "coordination_addrs contains an empty address: {addr:?}"
            ))));
        }

        if !self.root_path.starts_with('/') || (self.root_path.len() > 1 && self.root_path.ends_with('/')) {
            return Err(Error::Config(ConfigError::Message(format!(
                "root_path '{}' must be absolute and must not end with '/'",
                self.root_path
            ))));
        }

        Ok(())
    }
}

fn default_cluster_name() -> String {
    "default".to_string()
}
fn default_coordination_addrs() -> Vec<String> {
    vec!["127.0.0.1:2181".to_string()]
}
fn default_root_path() -> String {
    "/confdir".to_string()
}
