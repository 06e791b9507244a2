use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::CallbackRegistry;
use super::CallbackSlot;
use crate::coordination::CoordinationLink;
use crate::coordination::CoordinationService;
use crate::coordination::NodeEvent;
use crate::coordination::NodeEventKind;
use crate::metrics::DISPATCH_FAILURES;
use crate::metrics::WATCH_EVENTS;
use crate::state::StateTracker;
use crate::store::EntityStore;
use crate::store::StoredEntity;
use crate::ClusterConfig;
use crate::EntityRef;
use crate::Error;
use crate::NamespaceConfig;
use crate::PathLayout;
use crate::Result;
use crate::TableDefinition;

/// Work item of one dispatch worker
#[derive(Debug)]
pub enum DispatchTask<E> {
    /// A node of this worker's entity type changed
    Refresh(NodeEvent),
    /// Install a value this process already holds (local write or initial
    /// load); `ack` reports whether the store accepted it
    Apply { entity: E, ack: oneshot::Sender<bool> },
}

/// Entities the dispatcher routes, one impl per worker
pub trait Dispatched: StoredEntity {
    fn entity_ref(key: &Self::Key) -> EntityRef;

    fn callback_slot(registry: &CallbackRegistry) -> &CallbackSlot<Self>;

    fn queue(dispatcher: &WatchDispatcher) -> &mpsc::Sender<DispatchTask<Self>>;
}

impl Dispatched for ClusterConfig {
    fn entity_ref(_key: &Self::Key) -> EntityRef {
        EntityRef::Cluster
    }

    fn callback_slot(registry: &CallbackRegistry) -> &CallbackSlot<Self> {
        &registry.cluster
    }

    fn queue(dispatcher: &WatchDispatcher) -> &mpsc::Sender<DispatchTask<Self>> {
        &dispatcher.cluster_tx
    }
}

impl Dispatched for NamespaceConfig {
    fn entity_ref(key: &Self::Key) -> EntityRef {
        EntityRef::Namespace(key.clone())
    }

    fn callback_slot(registry: &CallbackRegistry) -> &CallbackSlot<Self> {
        &registry.namespace
    }

    fn queue(dispatcher: &WatchDispatcher) -> &mpsc::Sender<DispatchTask<Self>> {
        &dispatcher.namespace_tx
    }
}

impl Dispatched for TableDefinition {
    fn entity_ref(key: &Self::Key) -> EntityRef {
        EntityRef::Table(key.clone())
    }

    fn callback_slot(registry: &CallbackRegistry) -> &CallbackSlot<Self> {
        &registry.table
    }

    fn queue(dispatcher: &WatchDispatcher) -> &mpsc::Sender<DispatchTask<Self>> {
        &dispatcher.table_tx
    }
}

/// Routes node events and local applies to the per-type workers
///
/// Each entity type has exactly one worker, so callbacks for one key are
/// delivered in version order while the three types progress independently.
pub struct WatchDispatcher {
    layout: PathLayout,
    cluster_tx: mpsc::Sender<DispatchTask<ClusterConfig>>,
    namespace_tx: mpsc::Sender<DispatchTask<NamespaceConfig>>,
    table_tx: mpsc::Sender<DispatchTask<TableDefinition>>,
}

/// Receiving halves of the dispatch queues, consumed when workers spawn
pub struct DispatchQueues {
    cluster_rx: mpsc::Receiver<DispatchTask<ClusterConfig>>,
    namespace_rx: mpsc::Receiver<DispatchTask<NamespaceConfig>>,
    table_rx: mpsc::Receiver<DispatchTask<TableDefinition>>,
}

/// What every worker shares
pub struct WorkerContext<C: CoordinationService> {
    pub link: Arc<CoordinationLink<C>>,
    pub store: Arc<EntityStore>,
    pub callbacks: Arc<CallbackRegistry>,
    pub state: Arc<StateTracker>,
    pub cancel: CancellationToken,
}

impl<C: CoordinationService> Clone for WorkerContext<C> {
    fn clone(&self) -> Self {
        Self {
            link: self.link.clone(),
            store: self.store.clone(),
            callbacks: self.callbacks.clone(),
            state: self.state.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl WatchDispatcher {
    pub fn new(
        layout: PathLayout,
        queue_size: usize,
    ) -> (Self, DispatchQueues) {
        let (cluster_tx, cluster_rx) = mpsc::channel(queue_size);
        let (namespace_tx, namespace_rx) = mpsc::channel(queue_size);
        let (table_tx, table_rx) = mpsc::channel(queue_size);

        (
            Self {
                layout,
                cluster_tx,
                namespace_tx,
                table_tx,
            },
            DispatchQueues {
                cluster_rx,
                namespace_rx,
                table_rx,
            },
        )
    }

    /// Forward a node event to the worker owning its entity type.
    ///
    /// Paths outside the directory layout are ignored.
    pub async fn refresh(
        &self,
        event: NodeEvent,
    ) -> Result<()> {
        let Some(entity) = self.layout.classify(&event.path) else {
            trace!(path = %event.path, "ignoring event outside the directory layout");
            return Ok(());
        };

        let kind = entity.kind();
        WATCH_EVENTS.with_label_values(&[kind.as_str()]).inc();
        debug!(path = %event.path, event_kind = ?event.kind, %kind, "node changed");

        match entity {
            EntityRef::Cluster => send(&self.cluster_tx, DispatchTask::Refresh(event)).await,
            EntityRef::Namespace(_) => send(&self.namespace_tx, DispatchTask::Refresh(event)).await,
            EntityRef::Table(_) => send(&self.table_tx, DispatchTask::Refresh(event)).await,
        }
    }

    /// Install `entity` through its worker and wait until it is processed.
    ///
    /// Returns whether the store accepted the version; `false` means an
    /// equal or newer version was already cached.
    pub async fn apply<E: Dispatched>(
        &self,
        entity: E,
    ) -> Result<bool> {
        let (ack, ack_rx) = oneshot::channel();
        send(E::queue(self), DispatchTask::Apply { entity, ack }).await?;
        ack_rx.await.map_err(|_| Error::Closed)
    }
}

impl DispatchQueues {
    /// Spawn the three workers; they exit when `ctx.cancel` fires
    pub fn spawn<C: CoordinationService>(
        self,
        ctx: WorkerContext<C>,
    ) -> Vec<JoinHandle<()>> {
        vec![
            tokio::spawn(DispatchWorker::new(ctx.clone(), self.cluster_rx).run()),
            tokio::spawn(DispatchWorker::new(ctx.clone(), self.namespace_rx).run()),
            tokio::spawn(DispatchWorker::new(ctx, self.table_rx).run()),
        ]
    }
}

async fn send<T>(
    tx: &mpsc::Sender<T>,
    task: T,
) -> Result<()> {
    tx.send(task).await.map_err(|_| Error::Closed)
}

struct DispatchWorker<E: Dispatched, C: CoordinationService> {
    ctx: WorkerContext<C>,
    rx: mpsc::Receiver<DispatchTask<E>>,
}

impl<E: Dispatched, C: CoordinationService> DispatchWorker<E, C> {
    fn new(
        ctx: WorkerContext<C>,
        rx: mpsc::Receiver<DispatchTask<E>>,
    ) -> Self {
        Self { ctx, rx }
    }

    async fn run(mut self) {
        debug!(kind = %E::KIND, "dispatch worker started");
        loop {
            let task = tokio::select! {
                biased;
                _ = self.ctx.cancel.cancelled() => break,
                task = self.rx.recv() => match task {
                    Some(task) => task,
                    None => break,
                },
            };

            match task {
                DispatchTask::Refresh(event) => self.refresh(event).await,
                DispatchTask::Apply { entity, ack } => {
                    let accepted = self.install(entity);
                    let _ = ack.send(accepted);
                }
            }
        }
        debug!(kind = %E::KIND, "dispatch worker stopped");
    }

    async fn refresh(
        &self,
        event: NodeEvent,
    ) {
        if event.kind == NodeEventKind::Deleted {
            // Deletion is a tombstone value; a vanished node keeps its cached copy
            debug!(path = %event.path, kind = %E::KIND, "node deleted, cached value retained");
            return;
        }

        let stored = match event.data {
            Some(stored) => stored,
            None => match self.ctx.link.read(&event.path).await {
                Ok(Some(stored)) => stored,
                Ok(None) => {
                    debug!(path = %event.path, "node vanished before refetch");
                    return;
                }
                Err(e) => {
                    warn!(path = %event.path, error = %e, "refetch failed, skipping event");
                    DISPATCH_FAILURES.with_label_values(&[E::KIND.as_str()]).inc();
                    return;
                }
            },
        };

        match E::decode(&stored.data, stored.version) {
            Ok(entity) => {
                self.install(entity);
            }
            Err(e) => {
                warn!(path = %event.path, version = stored.version, error = %e, "undecodable value, skipping event");
                DISPATCH_FAILURES.with_label_values(&[E::KIND.as_str()]).inc();
            }
        }
    }

    /// CAS into the store, then announce the accepted version
    fn install(
        &self,
        entity: E,
    ) -> bool {
        let key = entity.key();
        let version = entity.version();
        let Some(installed) = E::install(&self.ctx.store, entity) else {
            return false;
        };

        trace!(kind = %E::KIND, %key, version, "installed");
        if !self.ctx.state.is_closed() {
            E::callback_slot(&self.ctx.callbacks).invoke(&installed);
        }
        true
    }
}
