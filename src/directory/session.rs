use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;
use tokio::time::sleep_until;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::coordination::CoordinationEvent;
use crate::coordination::CoordinationLink;
use crate::coordination::CoordinationService;
use crate::coordination::EventReceiver;
use crate::coordination::SessionState;
use crate::coordination::StoredValue;
use crate::metrics::DISPATCH_FAILURES;
use crate::state::StateTracker;
use crate::utils::backoff::retry_with_backoff;
use crate::watch::Dispatched;
use crate::watch::WatchDispatcher;
use crate::BackoffPolicy;
use crate::ClusterConfig;
use crate::ConnectionState;
use crate::Error;
use crate::NamespaceConfig;
use crate::Result;
use crate::TableDefinition;
use crate::TableKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Open a fresh session
    Connect,
    /// Full load of every entity
    Load,
    /// Steady state: forward node events, watch the session
    Serve,
    /// Session disconnected, waiting for it to come back
    Lost,
    /// Session gone for good, start over with a fresh one
    Reconnect,
    Stop,
}

/// Drives the connection state machine from the coordination session's
/// event stream. Runs as one background task per directory.
pub(crate) struct SessionDriver<C: CoordinationService> {
    pub(crate) link: Arc<CoordinationLink<C>>,
    pub(crate) state: Arc<StateTracker>,
    pub(crate) dispatcher: Arc<WatchDispatcher>,
    pub(crate) cancel: CancellationToken,
    pub(crate) session_timeout: Duration,
    pub(crate) load_policy: BackoffPolicy,
}

impl<C: CoordinationService> SessionDriver<C> {
    pub(crate) async fn run(self) {
        let mut events: Option<EventReceiver> = None;
        let mut established = false;
        let mut phase = Phase::Connect;

        while phase != Phase::Stop {
            if self.cancel.is_cancelled() || self.state.is_closed() {
                break;
            }

            phase = match phase {
                Phase::Connect => match self.link.establish(&self.cancel, established).await {
                    Ok(rx) => {
                        events = Some(rx);
                        established = true;
                        self.enter(ConnectionState::Loading, Phase::Load)
                    }
                    Err(Error::Closed) => Phase::Stop,
                    Err(e) => {
                        error!(error = %e, "giving up on the coordination service");
                        self.state.close();
                        Phase::Stop
                    }
                },
                Phase::Reconnect => {
                    events = None;
                    if let Err(e) = self.link.close().await {
                        debug!(error = %e, "closing the previous session failed");
                    }
                    self.enter(ConnectionState::Connecting, Phase::Connect)
                }
                Phase::Stop => Phase::Stop,
                Phase::Load | Phase::Serve | Phase::Lost => match events.as_mut() {
                    None => Phase::Reconnect,
                    Some(_) if phase == Phase::Load => self.load().await,
                    Some(rx) if phase == Phase::Serve => self.serve(rx).await,
                    Some(rx) => self.lost(rx).await,
                },
            };
        }
        debug!("session driver stopped");
    }

    /// Transition and continue with `next`; a rejected transition means
    /// the directory was closed underneath us.
    fn enter(
        &self,
        to: ConnectionState,
        next: Phase,
    ) -> Phase {
        match self.state.transition(to) {
            Ok(()) => next,
            Err(_) => Phase::Stop,
        }
    }

    async fn load(&self) -> Phase {
        let loaded = retry_with_backoff("load", &self.load_policy, &self.cancel, move || self.load_all()).await;
        match loaded {
            Ok(count) => {
                info!(entities = count, "directory loaded");
                self.enter(ConnectionState::Connected, Phase::Serve)
            }
            Err(Error::Closed) => Phase::Stop,
            Err(e) if e.is_retryable() => {
                warn!(error = %e, "initial load failed, waiting for the session");
                self.enter(ConnectionState::ConnectionLost, Phase::Lost)
            }
            Err(e) => {
                error!(error = %e, "initial load failed");
                self.state.close();
                Phase::Stop
            }
        }
    }

    /// Read every entity under the cluster root and install it through the
    /// dispatcher; returns how many values were read.
    async fn load_all(&self) -> Result<usize> {
        let layout = self.link.layout();
        let mut count = 0;

        if let Some(stored) = self.link.read(&layout.cluster_config()).await? {
            count += 1;
            self.install::<ClusterConfig>(&layout.cluster_config(), stored).await?;
        }

        for namespace in self.link.list(&layout.namespaces()).await? {
            let path = layout.namespace_config(&namespace);
            if let Some(stored) = self.link.read(&path).await? {
                count += 1;
                self.install::<NamespaceConfig>(&path, stored).await?;
            }

            let mut tables = Vec::new();
            for table_name in self.link.list(&layout.tables(&namespace)).await? {
                let path = layout.table(&TableKey::new(namespace.as_str(), table_name));
                if let Some(stored) = self.link.read(&path).await? {
                    tables.push((path, stored));
                }
            }
            count += tables.len();
            try_join_all(
                tables
                    .into_iter()
                    .map(|(path, stored)| async move { self.install::<TableDefinition>(&path, stored).await }),
            )
            .await?;
        }

        Ok(count)
    }

    async fn install<E: Dispatched>(
        &self,
        path: &str,
        stored: StoredValue,
    ) -> Result<()> {
        match E::decode(&stored.data, stored.version) {
            Ok(entity) => {
                self.dispatcher.apply(entity).await?;
            }
            Err(e) => {
                warn!(path, version = stored.version, error = %e, "undecodable value, skipping");
                DISPATCH_FAILURES.with_label_values(&[E::KIND.as_str()]).inc();
            }
        }
        Ok(())
    }

    async fn serve(
        &self,
        events: &mut EventReceiver,
    ) -> Phase {
        loop {
            let event = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Phase::Stop,
                event = events.recv() => event,
            };

            match event {
                Some(CoordinationEvent::Node(node)) => {
                    if self.dispatcher.refresh(node).await.is_err() {
                        return Phase::Stop;
                    }
                }
                Some(CoordinationEvent::Session(SessionState::Connected)) => {}
                Some(CoordinationEvent::Session(SessionState::Disconnected)) => {
                    warn!("coordination session disconnected");
                    return self.enter(ConnectionState::ConnectionLost, Phase::Lost);
                }
                Some(CoordinationEvent::Session(SessionState::Expired)) | None => {
                    warn!("coordination session expired");
                    return self.enter(ConnectionState::ConnectionLost, Phase::Reconnect);
                }
            }
        }
    }

    async fn lost(
        &self,
        events: &mut EventReceiver,
    ) -> Phase {
        let deadline = Instant::now() + self.session_timeout;
        loop {
            let event = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Phase::Stop,
                _ = sleep_until(deadline) => {
                    warn!(timeout = ?self.session_timeout, "session did not come back, reconnecting");
                    return Phase::Reconnect;
                }
                event = events.recv() => event,
            };

            match event {
                Some(CoordinationEvent::Node(node)) => {
                    if self.dispatcher.refresh(node).await.is_err() {
                        return Phase::Stop;
                    }
                }
                Some(CoordinationEvent::Session(SessionState::Connected)) => {
                    info!("coordination session restored, reloading");
                    return self.enter(ConnectionState::Loading, Phase::Load);
                }
                Some(CoordinationEvent::Session(SessionState::Disconnected)) => {}
                Some(CoordinationEvent::Session(SessionState::Expired)) | None => {
                    warn!("coordination session expired");
                    return Phase::Reconnect;
                }
            }
        }
    }
}
