use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::trace;

use crate::metrics::STALE_UPDATES_DISCARDED;
use crate::Entity;

/// Concurrent map of entities keyed by [`Entity::Key`]
///
/// Locking is per shard, so a reader of one key never waits on a writer of
/// a key in another shard. Values are handed out as `Arc`s; callers never
/// see the map's own slots.
pub struct VersionedMap<E: Entity> {
    entries: DashMap<E::Key, Arc<E>>,
}

impl<E: Entity> Default for VersionedMap<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> VersionedMap<E> {
    pub fn new() -> Self {
        Self { entries: DashMap::new() }
    }

    pub fn get<Q>(
        &self,
        key: &Q,
    ) -> Option<Arc<E>>
    where
        E::Key: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    pub fn version_of<Q>(
        &self,
        key: &Q,
    ) -> Option<u64>
    where
        E::Key: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key).map(|entry| entry.version())
    }

    /// Install `value` if its version is strictly newer than the cached one.
    ///
    /// Returns the installed value, or `None` when the offer was stale.
    pub fn set(
        &self,
        value: E,
    ) -> Option<Arc<E>> {
        let offered = value.version();
        if offered == 0 {
            self.discard(&value.key(), None, offered);
            return None;
        }

        match self.entries.entry(value.key()) {
            Entry::Occupied(mut occupied) => {
                let cached = occupied.get().version();
                if offered <= cached {
                    self.discard(occupied.key(), Some(cached), offered);
                    return None;
                }
                let value = Arc::new(value);
                occupied.insert(value.clone());
                Some(value)
            }
            Entry::Vacant(vacant) => {
                let value = Arc::new(value);
                vacant.insert(value.clone());
                Some(value)
            }
        }
    }

    /// Point-in-time copy of the entries matching `predicate`
    pub fn snapshot(
        &self,
        predicate: impl Fn(&E) -> bool,
    ) -> Snapshot<E> {
        let items = self
            .entries
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        Snapshot { items }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn discard(
        &self,
        key: &E::Key,
        cached: Option<u64>,
        offered: u64,
    ) {
        trace!(kind = %E::KIND, %key, ?cached, offered, "stale value discarded");
        STALE_UPDATES_DISCARDED.with_label_values(&[E::KIND.as_str()]).inc();
    }
}

/// Finite, restartable enumeration taken from a [`VersionedMap`]
///
/// Later writes to the map are not reflected.
#[derive(Debug, Clone)]
pub struct Snapshot<E> {
    items: Vec<Arc<E>>,
}

impl<E> Snapshot<E> {
    pub fn iter(&self) -> impl Iterator<Item = &E> + '_ {
        self.items.iter().map(|item| item.as_ref())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<E> IntoIterator for Snapshot<E> {
    type Item = Arc<E>;
    type IntoIter = std::vec::IntoIter<Arc<E>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
