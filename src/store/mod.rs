//! In-memory entity cache
//!
//! Every write into the store is a compare-and-swap on the version token:
//! a value is installed only when its version is strictly newer than the
//! cached one. A watch refetch racing a local update therefore can never
//! regress a key.

mod versioned_map;

pub use versioned_map::*;


use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::trace;

use crate::metrics::STALE_UPDATES_DISCARDED;
use crate::ClusterConfig;
use crate::Entity;
use crate::NamespaceConfig;
use crate::TableDefinition;
use crate::TableKey;

/// Cached copies of every directory entity
pub struct EntityStore {
    cluster: ArcSwap<ClusterConfig>,
    namespaces: VersionedMap<NamespaceConfig>,
    tables: VersionedMap<TableDefinition>,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore {
    pub fn new() -> Self {
        Self {
            cluster: ArcSwap::from_pointee(ClusterConfig::default()),
            namespaces: VersionedMap::new(),
            tables: VersionedMap::new(),
        }
    }

    /// The live cluster config; the default value at version 0 until one is loaded
    pub fn cluster(&self) -> Arc<ClusterConfig> {
        self.cluster.load_full()
    }

    pub fn set_cluster(
        &self,
        value: ClusterConfig,
    ) -> Option<Arc<ClusterConfig>> {
        let new = Arc::new(value);
        let mut current = self.cluster.load_full();
        loop {
            if new.version <= current.version {
                trace!(
                    cached = current.version,
                    offered = new.version,
                    "stale cluster config discarded"
                );
                STALE_UPDATES_DISCARDED
                    .with_label_values(&[ClusterConfig::KIND.as_str()])
                    .inc();
                return None;
            }

            let previous = self.cluster.compare_and_swap(&current, new.clone());
            if Arc::ptr_eq(&previous, &current) {
                return Some(new);
            }
            current = arc_swap::Guard::into_inner(previous);
        }
    }

    pub fn namespace(
        &self,
        key: &str,
    ) -> Option<Arc<NamespaceConfig>> {
        self.namespaces.get(key)
    }

    pub fn set_namespace(
        &self,
        value: NamespaceConfig,
    ) -> Option<Arc<NamespaceConfig>> {
        self.namespaces.set(value)
    }

    pub fn namespaces(&self) -> Snapshot<NamespaceConfig> {
        self.namespaces.snapshot(|_| true)
    }

    pub fn table(
        &self,
        key: &TableKey,
    ) -> Option<Arc<TableDefinition>> {
        self.tables.get(key)
    }

    pub fn set_table(
        &self,
        value: TableDefinition,
    ) -> Option<Arc<TableDefinition>> {
        self.tables.set(value)
    }

    pub fn tables(&self) -> Snapshot<TableDefinition> {
        self.tables.snapshot(|_| true)
    }

    /// Tables of one namespace
    pub fn tables_in(
        &self,
        namespace: &str,
    ) -> Snapshot<TableDefinition> {
        self.tables.snapshot(|t| t.customer == namespace)
    }
}

/// Typed access to the store, one impl per entity kind
pub trait StoredEntity: Entity {
    fn cached(
        store: &EntityStore,
        key: &Self::Key,
    ) -> Option<Arc<Self>>;

    /// CAS install; returns the installed value when the version was newer
    fn install(
        store: &EntityStore,
        value: Self,
    ) -> Option<Arc<Self>>;

    /// Cached version, `None` when the value was never stored
    fn cached_version(
        store: &EntityStore,
        key: &Self::Key,
    ) -> Option<u64> {
        Self::cached(store, key).map(|v| v.version()).filter(|v| *v > 0)
    }
}

impl StoredEntity for ClusterConfig {
    fn cached(
        store: &EntityStore,
        _key: &Self::Key,
    ) -> Option<Arc<Self>> {
        Some(store.cluster())
    }

    fn install(
        store: &EntityStore,
        value: Self,
    ) -> Option<Arc<Self>> {
        store.set_cluster(value)
    }
}

impl StoredEntity for NamespaceConfig {
    fn cached(
        store: &EntityStore,
        key: &Self::Key,
    ) -> Option<Arc<Self>> {
        store.namespace(key)
    }

    fn install(
        store: &EntityStore,
        value: Self,
    ) -> Option<Arc<Self>> {
        store.set_namespace(value)
    }
}

impl StoredEntity for TableDefinition {
    fn cached(
        store: &EntityStore,
        key: &Self::Key,
    ) -> Option<Arc<Self>> {
        store.table(key)
    }

    fn install(
        store: &EntityStore,
        value: Self,
    ) -> Option<Arc<Self>> {
        store.set_table(value)
    }
}
