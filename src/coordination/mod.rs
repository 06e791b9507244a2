//! Coordination service boundary
//!
//! The directory depends on a strongly consistent key/value service offering
//! versioned reads, conditional writes, recursive prefix watches and session
//! semantics. [`CoordinationService`] is that seam; any compatible service
//! (ZooKeeper, etcd, a Raft-backed store) can be bound behind it.
//!
//! - [`CoordinationLink`] - owns the service handle, (re)establishes sessions
//! - [`InMemoryCoordinator`] - in-process implementation with fault injection

mod link;
mod memory;

pub use link::*;
pub use memory::*;


use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
#[cfg(test)]
use mockall::automock;
use tokio::sync::mpsc;

use crate::CoordinationError;

pub type CoordinationResult<T> = std::result::Result<T, CoordinationError>;

/// Receiving half of a session's event stream
pub type EventReceiver = mpsc::UnboundedReceiver<CoordinationEvent>;

/// A stored value and the version the service assigned to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredValue {
    pub data: Bytes,
    pub version: u64,
}

/// Precondition of a conditional write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Unconditional overwrite
    Any,
    /// The path must not exist yet
    Absent,
    /// The stored version must match exactly
    Exact(u64),
}

impl ExpectedVersion {
    /// Precondition derived from the base version carried by a value;
    /// version 0 means the value was never stored
    pub fn from_base(version: u64) -> Self {
        if version == 0 {
            ExpectedVersion::Absent
        } else {
            ExpectedVersion::Exact(version)
        }
    }

    pub fn matches(
        &self,
        current: Option<u64>,
    ) -> bool {
        match (self, current) {
            (ExpectedVersion::Any, _) => true,
            (ExpectedVersion::Absent, None) => true,
            (ExpectedVersion::Exact(expected), Some(actual)) => *expected == actual,
            _ => false,
        }
    }
}

impl fmt::Display for ExpectedVersion {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            ExpectedVersion::Any => f.write_str("any"),
            ExpectedVersion::Absent => f.write_str("absent"),
            ExpectedVersion::Exact(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Disconnected,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeEventKind {
    Created,
    Changed,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeEvent {
    pub path: String,
    pub kind: NodeEventKind,
    /// New value when the service ships it with the notification; `None`
    /// means the receiver has to refetch
    pub data: Option<StoredValue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinationEvent {
    Session(SessionState),
    Node(NodeEvent),
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait CoordinationService: Send + Sync + 'static {
    /// Open a new session. Session-state and node-changed events are
    /// delivered on the returned receiver; the first event of a healthy
    /// session is `Session(Connected)`.
    async fn connect(&self) -> CoordinationResult<EventReceiver>;

    async fn read(
        &self,
        path: &str,
    ) -> CoordinationResult<Option<StoredValue>>;

    /// Names of the direct children of `path`
    async fn list(
        &self,
        path: &str,
    ) -> CoordinationResult<Vec<String>>;

    /// Conditional write; returns the version assigned to the new value
    async fn write(
        &self,
        path: &str,
        data: Bytes,
        expected: ExpectedVersion,
    ) -> CoordinationResult<u64>;

    /// Register a persistent recursive watch on `prefix` for the current session
    async fn watch(
        &self,
        prefix: &str,
    ) -> CoordinationResult<()>;

    /// Release the session. Idempotent.
    async fn close(&self) -> CoordinationResult<()>;
}
