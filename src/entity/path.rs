//! Mapping between entities and coordination-service paths
//!
//! ```text
//! <root>/<cluster>/config                                  -> ClusterConfig
//! <root>/<cluster>/namespaces/<namespace>/config           -> NamespaceConfig
//! <root>/<cluster>/namespaces/<namespace>/tables/<table>   -> TableDefinition
//! ```

use super::EntityKind;
use super::TableKey;
use crate::Error;
use crate::Result;

const CONFIG_NODE: &str = "config";
const NAMESPACES_NODE: &str = "namespaces";
const TABLES_NODE: &str = "tables";

/// An entity addressed by a coordination-service path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Cluster,
    Namespace(String),
    Table(TableKey),
}

impl EntityRef {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRef::Cluster => EntityKind::Cluster,
            EntityRef::Namespace(_) => EntityKind::Namespace,
            EntityRef::Table(_) => EntityKind::Table,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PathLayout {
    base: String,
}

impl PathLayout {
    pub fn new(
        root_path: &str,
        cluster_name: &str,
    ) -> Self {
        let root = root_path.trim_end_matches('/');
        Self {
            base: format!("{root}/{cluster_name}"),
        }
    }

    /// Prefix covering every path of this cluster; the watch root
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn cluster_config(&self) -> String {
        format!("{}/{CONFIG_NODE}", self.base)
    }

    pub fn namespaces(&self) -> String {
        format!("{}/{NAMESPACES_NODE}", self.base)
    }

    pub fn namespace_config(
        &self,
        namespace: &str,
    ) -> String {
        format!("{}/{namespace}/{CONFIG_NODE}", self.namespaces())
    }

    pub fn tables(
        &self,
        namespace: &str,
    ) -> String {
        format!("{}/{namespace}/{TABLES_NODE}", self.namespaces())
    }

    pub fn table(
        &self,
        key: &TableKey,
    ) -> String {
        format!("{}/{}", self.tables(&key.namespace), key.table_name)
    }

    pub fn path_of(
        &self,
        entity: &EntityRef,
    ) -> String {
        match entity {
            EntityRef::Cluster => self.cluster_config(),
            EntityRef::Namespace(ns) => self.namespace_config(ns),
            EntityRef::Table(key) => self.table(key),
        }
    }

    /// Classify a changed path. Paths that do not address an entity of this
    /// cluster return `None`.
    pub fn classify(
        &self,
        path: &str,
    ) -> Option<EntityRef> {
        let rest = path.strip_prefix(self.base.as_str())?.strip_prefix('/')?;
        let segments: Vec<&str> = rest.split('/').collect();

        if segments.iter().any(|s| s.is_empty()) {
            return None;
        }

        match segments.as_slice() {
            [CONFIG_NODE] => Some(EntityRef::Cluster),
            [NAMESPACES_NODE, ns, CONFIG_NODE] => Some(EntityRef::Namespace((*ns).to_string())),
            [NAMESPACES_NODE, ns, TABLES_NODE, table] => Some(EntityRef::Table(TableKey::new(*ns, *table))),
            _ => None,
        }
    }
}

/// A key used as a single path segment must be non-empty and must not
/// contain the separator
pub fn validate_segment(
    name: &str,
    value: &str,
) -> Result<()> {
    if value.is_empty() {
        return Err(Error::InvalidArgument(format!("{name} cannot be empty")));
    }
    if value.contains('/') {
        return Err(Error::InvalidArgument(format!(
            "{name} '{value}' must not contain '/'"
        )));
    }
    Ok(())
}
