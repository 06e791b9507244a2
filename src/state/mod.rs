//! Connection state machine
//!
//! ```text
//! Init --start--> Connecting --session--> Loading --loaded--> Connected
//!                     ^                      |                    |
//!                     |                      v                    v
//!                     +--expired/timeout-- ConnectionLost <--disconnected
//!                                            |   |
//!                                 reconnect  |   +--give up--> Closed
//!                                 -> Loading
//! any --stop/fatal--> Closed (terminal)
//! ```
//!
//! The current state is published through a `tokio::sync::watch` channel so
//! any number of callers can wait for `Connected` with a bounded timeout.

#[cfg(test)]
mod state_test;

use std::fmt;
use std::time::Duration;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::info;
use tracing::warn;

use crate::metrics::DIRECTORY_STATE;
use crate::Error;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ConnectionState {
    Init = 0,
    Connecting = 1,
    Loading = 2,
    Connected = 3,
    ConnectionLost = 4,
    Closed = 5,
}

impl ConnectionState {
    /// Whether `self -> to` is an edge of the state machine
    pub fn can_transition_to(
        &self,
        to: ConnectionState,
    ) -> bool {
        use ConnectionState::*;

        match (self, to) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Init, Connecting) => true,
            (Connecting, Loading) => true,
            (Loading, Connected) => true,
            (Loading, ConnectionLost) => true,
            (Connected, ConnectionLost) => true,
            (ConnectionLost, Loading) => true,
            (ConnectionLost, Connecting) => true,
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Closed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            ConnectionState::Init => "INIT",
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::Loading => "LOADING",
            ConnectionState::Connected => "CONNECTED",
            ConnectionState::ConnectionLost => "CONNECTION_LOST",
            ConnectionState::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

/// `(from, to)` pair emitted on every accepted transition
pub type Transition = (ConnectionState, ConnectionState);

/// Owner of the current [`ConnectionState`]
pub struct StateTracker {
    state_tx: watch::Sender<ConnectionState>,
    transition_listeners: Mutex<Vec<mpsc::UnboundedSender<Transition>>>,
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StateTracker {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Init);
        DIRECTORY_STATE.set(ConnectionState::Init as i64);
        Self {
            state_tx,
            transition_listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn current(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    pub fn is_closed(&self) -> bool {
        self.current().is_terminal()
    }

    /// Move to `to`. Illegal edges are rejected; `Closed` stays `Closed`.
    pub fn transition(
        &self,
        to: ConnectionState,
    ) -> Result<()> {
        let mut outcome = Ok(());
        let mut from = to;
        self.state_tx.send_if_modified(|state| {
            from = *state;
            if state.can_transition_to(to) {
                *state = to;
                true
            } else {
                outcome = Err(Error::InvalidTransition { from: *state, to });
                false
            }
        });

        match outcome {
            Ok(()) => {
                info!(%from, %to, "directory state transition");
                DIRECTORY_STATE.set(to as i64);
                self.notify_transition((from, to));
                Ok(())
            }
            Err(e) => {
                if from != ConnectionState::Closed {
                    warn!(%from, %to, "rejected directory state transition");
                }
                Err(e)
            }
        }
    }

    /// Move to `Closed`. Returns `false` if already closed.
    pub fn close(&self) -> bool {
        self.transition(ConnectionState::Closed).is_ok()
    }

    /// Wait until `Connected`, bounded by `limit`.
    ///
    /// # Errors
    /// - `Error::Closed` once the state is `Closed`, including for callers
    ///   already waiting when `stop()` runs
    /// - `Error::NotConnected` when `limit` elapses first
    pub async fn wait_connected(
        &self,
        limit: Duration,
    ) -> Result<()> {
        match self.current() {
            ConnectionState::Connected => return Ok(()),
            ConnectionState::Closed => return Err(Error::Closed),
            _ => {}
        }

        let started = Instant::now();
        let mut rx = self.state_tx.subscribe();
        let waited = timeout(limit, rx.wait_for(|s| matches!(s, ConnectionState::Connected | ConnectionState::Closed))).await;

        match waited {
            Ok(Ok(state)) if *state == ConnectionState::Connected => Ok(()),
            Ok(_) => Err(Error::Closed),
            Err(_) => Err(Error::NotConnected {
                waited: started.elapsed(),
            }),
        }
    }

    /// Latest-value view of the state
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Every accepted transition, in order
    pub fn subscribe_transitions(&self) -> mpsc::UnboundedReceiver<Transition> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.transition_listeners.lock().push(tx);
        rx
    }

    fn notify_transition(
        &self,
        transition: Transition,
    ) {
        self.transition_listeners.lock().retain(|tx| tx.send(transition).is_ok());
    }
}
