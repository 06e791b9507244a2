use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::metrics::CALLBACKS_INVOKED;
use crate::ClusterConfig;
use crate::Entity;
use crate::NamespaceConfig;
use crate::TableDefinition;

/// Observer of one entity type. Runs on the dispatch worker of that type,
/// so it should return quickly.
pub type ChangeCallback<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// A single replaceable callback
pub struct CallbackSlot<E> {
    callback: ArcSwapOption<ChangeCallback<E>>,
}

impl<E: Entity> Default for CallbackSlot<E> {
    fn default() -> Self {
        Self {
            callback: ArcSwapOption::empty(),
        }
    }
}

impl<E: Entity> CallbackSlot<E> {
    /// Register `callback`, replacing any previous one
    pub fn set(
        &self,
        callback: ChangeCallback<E>,
    ) {
        self.callback.store(Some(Arc::new(callback)));
    }

    pub fn clear(&self) {
        self.callback.store(None);
    }

    pub fn is_set(&self) -> bool {
        self.callback.load().is_some()
    }

    /// Returns whether a callback ran
    pub fn invoke(
        &self,
        value: &E,
    ) -> bool {
        let Some(callback) = self.callback.load_full() else {
            return false;
        };
        callback(value);
        CALLBACKS_INVOKED.with_label_values(&[E::KIND.as_str()]).inc();
        true
    }
}

/// One callback slot per entity type
#[derive(Default)]
pub struct CallbackRegistry {
    pub cluster: CallbackSlot<ClusterConfig>,
    pub namespace: CallbackSlot<NamespaceConfig>,
    pub table: CallbackSlot<TableDefinition>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}
