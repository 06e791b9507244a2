//! Directory entities
//!
//! The three metadata types managed by the directory:
//! - [`ClusterConfig`] - singleton, cluster-wide settings
//! - [`NamespaceConfig`] - keyed by customer/namespace key
//! - [`TableDefinition`] - keyed by `(namespace, table_name)`
//!
//! Every entity carries the version token the coordination service assigned
//! to the stored value. The version is never part of the encoded payload; it
//! is attached after every read and after every acknowledged write.

mod cluster;
mod namespace;
mod path;
mod table;

pub use cluster::*;
pub use namespace::*;
pub use path::*;
pub use table::*;

#[cfg(test)]
mod entity_test;

use std::fmt;
use std::fmt::Debug;
use std::hash::Hash;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Cluster,
    Namespace,
    Table,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Cluster, EntityKind::Namespace, EntityKind::Table];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Cluster => "cluster",
            EntityKind::Namespace => "namespace",
            EntityKind::Table => "table",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common behaviour of the three directory entities
pub trait Entity: Clone + Debug + Send + Sync + Serialize + DeserializeOwned + 'static {
    type Key: Clone + Debug + Eq + Hash + Send + Sync + fmt::Display + 'static;

    const KIND: EntityKind;

    fn key(&self) -> Self::Key;

    /// Version token assigned by the coordination service (0 = never stored)
    fn version(&self) -> u64;

    fn set_version(
        &mut self,
        version: u64,
    );

    /// Rejects values that must never reach the coordination service
    fn validate(&self) -> Result<()>;

    fn with_version(
        mut self,
        version: u64,
    ) -> Self {
        self.set_version(version);
        self
    }

    fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    fn decode(
        bytes: &[u8],
        version: u64,
    ) -> Result<Self> {
        let entity: Self = bincode::deserialize(bytes)?;
        Ok(entity.with_version(version))
    }
}
