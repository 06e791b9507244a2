//! Directory facade
//!
//! [`Directory`] is the only type callers need: it owns the coordination
//! link, the connection state machine, the entity cache and the dispatch
//! workers, and exposes typed get/update/list/callback operations gated on
//! the `Connected` state.
//!
//! ```text
//!  caller ──get──► state gate ──► EntityStore
//!  caller ──update─► state gate ──► CoordinationLink::write ──► WatchDispatcher::apply
//!  session ──events──► SessionDriver ──► WatchDispatcher::refresh ──► EntityStore ──► callback
//! ```

mod session;


use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use self::session::SessionDriver;
use crate::coordination::CoordinationLink;
use crate::coordination::CoordinationService;
use crate::coordination::ExpectedVersion;
use crate::state::StateTracker;
use crate::state::Transition;
use crate::store::EntityStore;
use crate::watch::CallbackRegistry;
use crate::watch::ChangeCallback;
use crate::watch::DispatchQueues;
use crate::watch::Dispatched;
use crate::watch::WatchDispatcher;
use crate::watch::WorkerContext;
use crate::ClusterConfig;
use crate::ConnectionState;
use crate::CoordinationError;
use crate::DirectoryConfig;
use crate::Entity;
use crate::Error;
use crate::NamespaceConfig;
use crate::Result;
use crate::TableDefinition;
use crate::TableKey;

/// Cached, watch-synchronized view of cluster, namespace and table metadata
///
/// Reads wait (bounded) for `Connected` and then serve from the local cache.
/// Updates are optimistic: the version carried by the value is the base the
/// write is conditioned on, `0` meaning the entity must not exist yet.
#[async_trait]
pub trait ConfigDirectory: Send + Sync {
    /// Connect, load everything and wait for `Connected`.
    ///
    /// # Errors
    /// - `Error::AlreadyStarted` on a second call
    /// - `Error::Closed` after `stop()`
    /// - `Error::NotConnected` when the startup wait elapses; the directory
    ///   keeps trying in the background
    async fn start(&self) -> Result<()>;

    /// Close the directory. Idempotent; afterwards every operation fails
    /// with `Error::Closed` and no callback runs.
    async fn stop(&self) -> Result<()>;

    fn state(&self) -> ConnectionState;

    async fn get_cluster_config(&self) -> Result<ClusterConfig>;

    /// Returns the new version
    async fn update_cluster_config(
        &self,
        config: ClusterConfig,
    ) -> Result<u64>;

    async fn get_namespace_config(
        &self,
        customer: &str,
    ) -> Result<Arc<NamespaceConfig>>;

    async fn update_namespace_config(
        &self,
        config: NamespaceConfig,
    ) -> Result<u64>;

    /// Visit every namespace once, in no particular order
    async fn list_namespaces(
        &self,
        visit: &mut (dyn for<'v> FnMut(&'v NamespaceConfig) + Send),
    ) -> Result<()>;

    async fn get_table_config(
        &self,
        namespace: &str,
        table_name: &str,
    ) -> Result<TableDefinition>;

    /// With `force`, overwrite regardless of the stored version
    async fn update_table_config(
        &self,
        table: TableDefinition,
        force: bool,
    ) -> Result<u64>;

    /// Visit every table once, in no particular order
    async fn list_tables(
        &self,
        visit: &mut (dyn for<'v> FnMut(&'v TableDefinition) + Send),
    ) -> Result<()>;

    fn set_cluster_config_change_callback(
        &self,
        callback: ChangeCallback<ClusterConfig>,
    );

    fn set_namespace_config_change_callback(
        &self,
        callback: ChangeCallback<NamespaceConfig>,
    );

    fn set_table_config_change_callback(
        &self,
        callback: ChangeCallback<TableDefinition>,
    );
}

/// [`ConfigDirectory`] over any [`CoordinationService`]
pub struct Directory<C: CoordinationService> {
    config: DirectoryConfig,
    link: Arc<CoordinationLink<C>>,
    state: Arc<StateTracker>,
    store: Arc<EntityStore>,
    callbacks: Arc<CallbackRegistry>,
    dispatcher: Arc<WatchDispatcher>,
    cancel: CancellationToken,

    /// Taken by the first `start()`
    queues: Mutex<Option<DispatchQueues>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl<C: CoordinationService> Directory<C> {
    /// Validates `config`; nothing is spawned until [`ConfigDirectory::start`]
    pub fn new(
        config: DirectoryConfig,
        service: Arc<C>,
    ) -> Result<Self> {
        let config = config.validate()?;
        let link = Arc::new(CoordinationLink::new(service, &config));
        let (dispatcher, queues) = WatchDispatcher::new(link.layout().clone(), config.watch.dispatch_queue_size);

        Ok(Self {
            config,
            link,
            state: Arc::new(StateTracker::new()),
            store: Arc::new(EntityStore::new()),
            callbacks: Arc::new(CallbackRegistry::new()),
            dispatcher: Arc::new(dispatcher),
            cancel: CancellationToken::new(),
            queues: Mutex::new(Some(queues)),
            tasks: Mutex::new(Vec::new()),
            stopped: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// Every accepted state transition from now on, in order
    pub fn subscribe_transitions(&self) -> mpsc::UnboundedReceiver<Transition> {
        self.state.subscribe_transitions()
    }

    /// Latest-value view of the connection state
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Bounded wait for `Connected`
    pub async fn wait_connected(
        &self,
        limit: Duration,
    ) -> Result<()> {
        self.state.wait_connected(limit).await
    }

    async fn ready(&self) -> Result<()> {
        self.state.wait_connected(self.config.session.wait_connected_timeout()).await
    }

    async fn update<E: Dispatched>(
        &self,
        value: E,
        expected: ExpectedVersion,
    ) -> Result<u64> {
        if self.state.is_closed() {
            return Err(Error::Closed);
        }
        value.validate()?;
        self.ready().await?;

        let key = value.key();
        let base = value.version();
        let cached = E::cached_version(&self.store, &key);
        if !expected.matches(cached) {
            debug!(kind = %E::KIND, %key, base, ?cached, "write conflict against cache");
            return Err(Error::WriteConflict {
                kind: E::KIND,
                key: key.to_string(),
                expected: base,
                actual: cached,
            });
        }

        let path = self.link.layout().path_of(&E::entity_ref(&key));
        let data = value.encode()?;
        let version = match self.link.write(&path, data.into(), expected).await {
            Ok(version) => version,
            Err(Error::Coordination(CoordinationError::VersionMismatch { actual, .. })) => {
                debug!(kind = %E::KIND, %key, base, ?actual, "write conflict");
                return Err(Error::WriteConflict {
                    kind: E::KIND,
                    key: key.to_string(),
                    expected: base,
                    actual,
                });
            }
            Err(e) => return Err(self.surface(e)),
        };
        info!(kind = %E::KIND, %key, base, version, "updated");

        let apply_timeout = self.config.watch.apply_timeout();
        match timeout(apply_timeout, self.dispatcher.apply(value.with_version(version))).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => warn!(kind = %E::KIND, %key, version, "written value not applied locally in time"),
        }
        Ok(version)
    }

    /// Transient coordination failures reach callers as `NotConnected`
    fn surface(
        &self,
        e: Error,
    ) -> Error {
        match e {
            Error::Coordination(ref inner) if inner.is_transient() => {
                debug!(error = %inner, "coordination unavailable");
                Error::NotConnected { waited: Duration::ZERO }
            }
            other => other,
        }
    }
}

#[async_trait]
impl<C: CoordinationService> ConfigDirectory for Directory<C> {
    async fn start(&self) -> Result<()> {
        if self.state.is_closed() {
            return Err(Error::Closed);
        }
        let queues = self.queues.lock().take().ok_or(Error::AlreadyStarted)?;
        self.state.transition(ConnectionState::Connecting)?;

        let ctx = WorkerContext {
            link: self.link.clone(),
            store: self.store.clone(),
            callbacks: self.callbacks.clone(),
            state: self.state.clone(),
            cancel: self.cancel.clone(),
        };
        let mut handles = queues.spawn(ctx);

        let driver = SessionDriver {
            link: self.link.clone(),
            state: self.state.clone(),
            dispatcher: self.dispatcher.clone(),
            cancel: self.cancel.clone(),
            session_timeout: self.config.session.session_timeout(),
            load_policy: self.config.retry.load,
        };
        handles.push(tokio::spawn(driver.run()));
        self.tasks.lock().extend(handles);

        info!(base = self.link.layout().base(), "directory starting");
        self.state.wait_connected(self.config.session.startup_timeout()).await
    }

    async fn stop(&self) -> Result<()> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.state.close();
        self.cancel.cancel();

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "background task failed");
            }
        }

        if let Err(e) = self.link.close().await {
            warn!(error = %e, "closing the coordination session failed");
        }
        info!("directory stopped");
        Ok(())
    }

    fn state(&self) -> ConnectionState {
        self.state.current()
    }

    async fn get_cluster_config(&self) -> Result<ClusterConfig> {
        self.ready().await?;
        Ok(self.store.cluster().as_ref().clone())
    }

    async fn update_cluster_config(
        &self,
        config: ClusterConfig,
    ) -> Result<u64> {
        let expected = ExpectedVersion::from_base(config.version);
        self.update(config, expected).await
    }

    async fn get_namespace_config(
        &self,
        customer: &str,
    ) -> Result<Arc<NamespaceConfig>> {
        self.ready().await?;
        if customer.is_empty() {
            return Err(Error::InvalidArgument("namespace key cannot be empty".into()));
        }
        self.store.namespace(customer).ok_or_else(|| Error::NotFound {
            kind: NamespaceConfig::KIND,
            key: customer.to_string(),
        })
    }

    async fn update_namespace_config(
        &self,
        config: NamespaceConfig,
    ) -> Result<u64> {
        let expected = ExpectedVersion::from_base(config.version);
        self.update(config, expected).await
    }

    async fn list_namespaces(
        &self,
        visit: &mut (dyn for<'v> FnMut(&'v NamespaceConfig) + Send),
    ) -> Result<()> {
        self.ready().await?;
        for namespace in self.store.namespaces().iter() {
            visit(namespace);
        }
        Ok(())
    }

    async fn get_table_config(
        &self,
        namespace: &str,
        table_name: &str,
    ) -> Result<TableDefinition> {
        self.ready().await?;
        if namespace.is_empty() || table_name.is_empty() {
            return Err(Error::InvalidArgument(
                "namespace and table name cannot be empty".into(),
            ));
        }
        let key = TableKey::new(namespace, table_name);
        match self.store.table(&key) {
            Some(table) => Ok(table.as_ref().clone()),
            None => Err(Error::NotFound {
                kind: TableDefinition::KIND,
                key: key.to_string(),
            }),
        }
    }

    async fn update_table_config(
        &self,
        table: TableDefinition,
        force: bool,
    ) -> Result<u64> {
        let expected = if force {
            ExpectedVersion::Any
        } else {
            ExpectedVersion::from_base(table.version)
        };
        self.update(table, expected).await
    }

    async fn list_tables(
        &self,
        visit: &mut (dyn for<'v> FnMut(&'v TableDefinition) + Send),
    ) -> Result<()> {
        self.ready().await?;
        for table in self.store.tables().iter() {
            visit(table);
        }
        Ok(())
    }

    fn set_cluster_config_change_callback(
        &self,
        callback: ChangeCallback<ClusterConfig>,
    ) {
        self.callbacks.cluster.set(callback);
    }

    fn set_namespace_config_change_callback(
        &self,
        callback: ChangeCallback<NamespaceConfig>,
    ) {
        self.callbacks.namespace.set(callback);
    }

    fn set_table_config_change_callback(
        &self,
        callback: ChangeCallback<TableDefinition>,
    ) {
        self.callbacks.table.set(callback);
    }
}

impl<C: CoordinationService> Drop for Directory<C> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
