use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use super::Entity;
use super::EntityKind;
use crate::Error;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ServerStatus {
    #[default]
    Joining,
    Up,
    Draining,
    Down,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub server_id: String,
    pub listen_addr: String,
    pub status: ServerStatus,
}

/// Cluster-wide settings. Exactly one instance exists per cluster; updates
/// replace it wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    #[serde(skip)]
    pub version: u64,
    pub replication_factor: u32,
    pub servers: Vec<ServerConfig>,
    /// Free-form settings the directory treats as opaque
    pub properties: BTreeMap<String, String>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            version: 0,
            replication_factor: 3,
            servers: Vec::new(),
            properties: BTreeMap::new(),
        }
    }
}

impl ClusterConfig {
    pub fn server(
        &self,
        server_id: &str,
    ) -> Option<&ServerConfig> {
        self.servers.iter().find(|s| s.server_id == server_id)
    }
}

impl Entity for ClusterConfig {
    type Key = &'static str;

    const KIND: EntityKind = EntityKind::Cluster;

    fn key(&self) -> Self::Key {
        "cluster"
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(
        &mut self,
        version: u64,
    ) {
        self.version = version;
    }

    fn validate(&self) -> Result<()> {
        if self.replication_factor == 0 {
            return Err(Error::InvalidArgument(
                "replication_factor must be greater than 0".into(),
            ));
        }

        let mut ids = std::collections::HashSet::new();
        for server in &self.servers {
            if server.server_id.is_empty() {
                return Err(Error::InvalidArgument("server_id cannot be empty".into()));
            }
            if !ids.insert(server.server_id.as_str()) {
                return Err(Error::InvalidArgument(format!(
                    "duplicate server_id {} in cluster config",
                    server.server_id
                )));
            }
        }

        Ok(())
    }
}
