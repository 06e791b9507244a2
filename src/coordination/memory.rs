//! In-process coordination service
//!
//! A strongly consistent, versioned key/value tree with recursive prefix
//! watches and session semantics. Versions come from a single counter
//! shared by all paths, so a newer write always carries a larger version,
//! like a ZooKeeper zxid or an etcd revision.
//!
//! One [`InMemoryCoordinator`] models the service; every
//! [`InMemoryClient`] obtained from it models one process holding its own
//! session. The fault-injection hooks (`disconnect`, `restore`, `expire`,
//! `set_reachable`) drive the session state machine of the directories
//! attached to it.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;
use tracing::trace;

use super::CoordinationEvent;
use super::CoordinationResult;
use super::CoordinationService;
use super::EventReceiver;
use super::ExpectedVersion;
use super::NodeEvent;
use super::NodeEventKind;
use super::SessionState;
use super::StoredValue;
use crate::CoordinationError;

struct SessionEntry {
    tx: mpsc::UnboundedSender<CoordinationEvent>,
    watches: Vec<String>,
    connected: bool,
}

impl SessionEntry {
    fn send(
        &self,
        event: CoordinationEvent,
    ) {
        let _ = self.tx.send(event);
    }

    fn watches(
        &self,
        path: &str,
    ) -> bool {
        self.watches.iter().any(|prefix| {
            path == prefix
                || (path.starts_with(prefix.as_str()) && path.as_bytes().get(prefix.len()) == Some(&b'/'))
        })
    }
}

struct CoordinatorState {
    nodes: BTreeMap<String, StoredValue>,
    last_version: u64,
    reachable: bool,
    sessions: HashMap<String, SessionEntry>,
}

impl CoordinatorState {
    fn session(
        &self,
        session_id: Option<&String>,
    ) -> CoordinationResult<&SessionEntry> {
        let id = session_id.ok_or(CoordinationError::SessionExpired)?;
        let entry = self.sessions.get(id).ok_or(CoordinationError::SessionExpired)?;
        if !self.reachable || !entry.connected {
            return Err(CoordinationError::ConnectionLoss);
        }
        Ok(entry)
    }

    fn notify(
        &self,
        event: NodeEvent,
    ) {
        for entry in self.sessions.values() {
            if entry.connected && entry.watches(&event.path) {
                entry.send(CoordinationEvent::Node(event.clone()));
            }
        }
    }

    fn apply_write(
        &mut self,
        path: &str,
        data: Bytes,
        expected: ExpectedVersion,
    ) -> CoordinationResult<u64> {
        let current = self.nodes.get(path).map(|v| v.version);
        if !expected.matches(current) {
            return Err(CoordinationError::VersionMismatch {
                path: path.to_string(),
                expected: expected.to_string(),
                actual: current,
            });
        }

        self.last_version += 1;
        let stored = StoredValue {
            data,
            version: self.last_version,
        };
        self.nodes.insert(path.to_string(), stored.clone());

        let kind = if current.is_some() {
            NodeEventKind::Changed
        } else {
            NodeEventKind::Created
        };
        trace!(path, version = stored.version, ?kind, "node written");
        self.notify(NodeEvent {
            path: path.to_string(),
            kind,
            data: Some(stored.clone()),
        });

        Ok(stored.version)
    }
}

/// The shared service all [`InMemoryClient`]s talk to
#[derive(Clone)]
pub struct InMemoryCoordinator {
    state: Arc<Mutex<CoordinatorState>>,
}

impl Default for InMemoryCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCoordinator {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(CoordinatorState {
                nodes: BTreeMap::new(),
                last_version: 0,
                reachable: true,
                sessions: HashMap::new(),
            })),
        }
    }

    /// A new client handle; each handle holds at most one session
    pub fn client(&self) -> InMemoryClient {
        InMemoryClient {
            coordinator: self.clone(),
            session_id: Mutex::new(None),
        }
    }

    /// Write bypassing any session, as another process would
    pub fn put(
        &self,
        path: &str,
        data: impl Into<Bytes>,
    ) -> u64 {
        let mut state = self.state.lock();
        // An unconditional write can't fail
        state.apply_write(path, data.into(), ExpectedVersion::Any).unwrap_or_default()
    }

    pub fn get(
        &self,
        path: &str,
    ) -> Option<StoredValue> {
        self.state.lock().nodes.get(path).cloned()
    }

    /// Physically remove a node and notify watchers
    pub fn delete(
        &self,
        path: &str,
    ) -> bool {
        let mut state = self.state.lock();
        if state.nodes.remove(path).is_none() {
            return false;
        }
        state.notify(NodeEvent {
            path: path.to_string(),
            kind: NodeEventKind::Deleted,
            data: None,
        });
        true
    }

    pub fn last_version(&self) -> u64 {
        self.state.lock().last_version
    }

    pub fn session_count(&self) -> usize {
        self.state.lock().sessions.len()
    }

    /// When unreachable, every session is disconnected and connects fail
    pub fn set_reachable(
        &self,
        reachable: bool,
    ) {
        let mut state = self.state.lock();
        if state.reachable == reachable {
            return;
        }
        state.reachable = reachable;
        let event = if reachable {
            SessionState::Connected
        } else {
            SessionState::Disconnected
        };
        for entry in state.sessions.values() {
            if entry.connected {
                entry.send(CoordinationEvent::Session(event));
            }
        }
        debug!(reachable, "coordinator reachability changed");
    }

    /// Expire every live session
    pub fn expire_all(&self) {
        let mut state = self.state.lock();
        for (id, entry) in state.sessions.drain() {
            entry.send(CoordinationEvent::Session(SessionState::Expired));
            debug!(session_id = %id, "session expired");
        }
    }

    fn with_state<R>(
        &self,
        f: impl FnOnce(&mut CoordinatorState) -> R,
    ) -> R {
        f(&mut self.state.lock())
    }
}

/// One process's handle on an [`InMemoryCoordinator`]
pub struct InMemoryClient {
    coordinator: InMemoryCoordinator,
    session_id: Mutex<Option<String>>,
}

impl InMemoryClient {
    pub fn session_id(&self) -> Option<String> {
        self.session_id.lock().clone()
    }

    /// Transient disconnect; the session survives and can be restored
    pub fn disconnect(&self) {
        self.set_connected(false);
    }

    /// Reconnect a disconnected session
    pub fn restore(&self) {
        self.set_connected(true);
    }

    /// Expire this client's session; watches are dropped with it
    pub fn expire(&self) {
        let Some(id) = self.session_id.lock().take() else {
            return;
        };
        self.coordinator.with_state(|state| {
            if let Some(entry) = state.sessions.remove(&id) {
                entry.send(CoordinationEvent::Session(SessionState::Expired));
                debug!(session_id = %id, "session expired");
            }
        });
    }

    fn set_connected(
        &self,
        connected: bool,
    ) {
        let Some(id) = self.session_id() else {
            return;
        };
        self.coordinator.with_state(|state| {
            let reachable = state.reachable;
            if let Some(entry) = state.sessions.get_mut(&id) {
                if entry.connected == connected {
                    return;
                }
                entry.connected = connected;
                if !reachable {
                    return;
                }
                let event = if connected {
                    SessionState::Connected
                } else {
                    SessionState::Disconnected
                };
                entry.send(CoordinationEvent::Session(event));
            }
        });
    }
}

#[async_trait]
impl CoordinationService for InMemoryClient {
    async fn connect(&self) -> CoordinationResult<EventReceiver> {
        let mut session_id = self.session_id.lock();
        self.coordinator.with_state(|state| {
            if !state.reachable {
                return Err(CoordinationError::Unavailable("coordinator unreachable".into()));
            }
            if let Some(old) = session_id.take() {
                state.sessions.remove(&old);
            }

            let (tx, rx) = mpsc::unbounded_channel();
            let id = nanoid::nanoid!();
            let entry = SessionEntry {
                tx,
                watches: Vec::new(),
                connected: true,
            };
            entry.send(CoordinationEvent::Session(SessionState::Connected));
            state.sessions.insert(id.clone(), entry);
            debug!(session_id = %id, "session established");
            *session_id = Some(id);
            Ok(rx)
        })
    }

    async fn read(
        &self,
        path: &str,
    ) -> CoordinationResult<Option<StoredValue>> {
        let session_id = self.session_id();
        self.coordinator.with_state(|state| {
            state.session(session_id.as_ref())?;
            Ok(state.nodes.get(path).cloned())
        })
    }

    async fn list(
        &self,
        path: &str,
    ) -> CoordinationResult<Vec<String>> {
        let session_id = self.session_id();
        self.coordinator.with_state(|state| {
            state.session(session_id.as_ref())?;
            let prefix = format!("{}/", path.trim_end_matches('/'));
            let children: BTreeSet<String> = state
                .nodes
                .range(prefix.clone()..)
                .take_while(|(k, _)| k.starts_with(&prefix))
                .filter_map(|(k, _)| k[prefix.len()..].split('/').next())
                .filter(|child| !child.is_empty())
                .map(str::to_string)
                .collect();
            Ok(children.into_iter().collect())
        })
    }

    async fn write(
        &self,
        path: &str,
        data: Bytes,
        expected: ExpectedVersion,
    ) -> CoordinationResult<u64> {
        let session_id = self.session_id();
        self.coordinator.with_state(|state| {
            state.session(session_id.as_ref())?;
            state.apply_write(path, data, expected)
        })
    }

    async fn watch(
        &self,
        prefix: &str,
    ) -> CoordinationResult<()> {
        let session_id = self.session_id();
        self.coordinator.with_state(|state| {
            state.session(session_id.as_ref())?;
            let id = session_id.as_ref().ok_or(CoordinationError::SessionExpired)?;
            if let Some(entry) = state.sessions.get_mut(id) {
                if !entry.watches.iter().any(|w| w == prefix) {
                    entry.watches.push(prefix.to_string());
                }
            }
            Ok(())
        })
    }

    async fn close(&self) -> CoordinationResult<()> {
        if let Some(id) = self.session_id.lock().take() {
            self.coordinator.with_state(|state| {
                state.sessions.remove(&id);
            });
            debug!(session_id = %id, "session closed");
        }
        Ok(())
    }
}
