use std::sync::Arc;
use std::time::Duration;

use super::*;

#[test]
fn test_legal_edges() {
    use ConnectionState::*;

    assert!(Init.can_transition_to(Connecting));
    assert!(Connecting.can_transition_to(Loading));
    assert!(Loading.can_transition_to(Connected));
    assert!(Connected.can_transition_to(ConnectionLost));
    assert!(ConnectionLost.can_transition_to(Loading));
    assert!(ConnectionLost.can_transition_to(Connecting));
    assert!(Loading.can_transition_to(ConnectionLost));

    for state in [Init, Connecting, Loading, Connected, ConnectionLost] {
        assert!(state.can_transition_to(Closed), "{state} -> Closed");
    }
}

#[test]
fn test_illegal_edges() {
    use ConnectionState::*;

    assert!(!Init.can_transition_to(Connected));
    assert!(!Init.can_transition_to(Loading));
    assert!(!Connecting.can_transition_to(Connected));
    assert!(!Connected.can_transition_to(Loading));
    assert!(!Connected.can_transition_to(Connecting));
    assert!(!Connected.can_transition_to(Connected));

    for state in [Init, Connecting, Loading, Connected, ConnectionLost, Closed] {
        assert!(!Closed.can_transition_to(state), "Closed -> {state}");
    }
}

#[test]
fn test_transition_rejects_illegal_edge() {
    let tracker = StateTracker::new();

    let result = tracker.transition(ConnectionState::Connected);
    assert!(matches!(
        result,
        Err(Error::InvalidTransition {
            from: ConnectionState::Init,
            to: ConnectionState::Connected
        })
    ));
    assert_eq!(tracker.current(), ConnectionState::Init);
}

#[test]
fn test_close_is_terminal_and_idempotent() {
    let tracker = StateTracker::new();
    tracker.transition(ConnectionState::Connecting).unwrap();

    assert!(tracker.close());
    assert!(tracker.is_closed());
    assert!(!tracker.close());
    assert!(tracker.transition(ConnectionState::Connecting).is_err());
    assert_eq!(tracker.current(), ConnectionState::Closed);
}

#[test]
fn test_transition_listener_sees_every_edge_in_order() {
    let tracker = StateTracker::new();
    let mut rx = tracker.subscribe_transitions();

    tracker.transition(ConnectionState::Connecting).unwrap();
    tracker.transition(ConnectionState::Loading).unwrap();
    tracker.transition(ConnectionState::Connected).unwrap();
    tracker.transition(ConnectionState::ConnectionLost).unwrap();
    tracker.transition(ConnectionState::Loading).unwrap();
    tracker.transition(ConnectionState::Connected).unwrap();
    let _ = tracker.transition(ConnectionState::Init);

    let mut seen = Vec::new();
    while let Ok(t) = rx.try_recv() {
        seen.push(t);
    }
    assert_eq!(
        seen,
        vec![
            (ConnectionState::Init, ConnectionState::Connecting),
            (ConnectionState::Connecting, ConnectionState::Loading),
            (ConnectionState::Loading, ConnectionState::Connected),
            (ConnectionState::Connected, ConnectionState::ConnectionLost),
            (ConnectionState::ConnectionLost, ConnectionState::Loading),
            (ConnectionState::Loading, ConnectionState::Connected),
        ]
    );
}

#[test]
fn test_dropped_listener_is_pruned() {
    let tracker = StateTracker::new();
    let rx = tracker.subscribe_transitions();
    drop(rx);

    tracker.transition(ConnectionState::Connecting).unwrap();
    assert!(tracker.transition_listeners.lock().is_empty());
}

#[tokio::test]
async fn test_wait_connected_returns_immediately_when_connected() {
    let tracker = StateTracker::new();
    tracker.transition(ConnectionState::Connecting).unwrap();
    tracker.transition(ConnectionState::Loading).unwrap();
    tracker.transition(ConnectionState::Connected).unwrap();

    tracker.wait_connected(Duration::from_millis(1)).await.unwrap();
}

#[tokio::test]
async fn test_wait_connected_times_out() {
    let tracker = StateTracker::new();
    tracker.transition(ConnectionState::Connecting).unwrap();

    let result = tracker.wait_connected(Duration::from_millis(20)).await;
    match result {
        Err(Error::NotConnected { waited }) => assert!(waited >= Duration::from_millis(20)),
        other => panic!("expected NotConnected, got {other:?}"),
    }
}

#[tokio::test]
async fn test_wait_connected_wakes_on_connect() {
    let tracker = Arc::new(StateTracker::new());
    tracker.transition(ConnectionState::Connecting).unwrap();

    let waiter = {
        let tracker = tracker.clone();
        tokio::spawn(async move { tracker.wait_connected(Duration::from_secs(5)).await })
    };

    tokio::time::sleep(Duration::from_millis(10)).await;
    tracker.transition(ConnectionState::Loading).unwrap();
    tracker.transition(ConnectionState::Connected).unwrap();

    waiter.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_waiters_observe_closed() {
    let tracker = Arc::new(StateTracker::new());
    tracker.transition(ConnectionState::Connecting).unwrap();

    let waiter = {
        let tracker = tracker.clone();
        tokio::spawn(async move { tracker.wait_connected(Duration::from_secs(5)).await })
    };

    tokio::time::sleep(Duration::from_millis(10)).await;
    tracker.close();

    assert!(matches!(waiter.await.unwrap(), Err(Error::Closed)));
    assert!(matches!(
        tracker.wait_connected(Duration::from_secs(1)).await,
        Err(Error::Closed)
    ));
}

#[test]
fn test_display_names() {
    assert_eq!(ConnectionState::ConnectionLost.to_string(), "CONNECTION_LOST");
    assert_eq!(ConnectionState::Init.to_string(), "INIT");
}
