use lazy_static::lazy_static;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;


lazy_static! {
    pub static ref WATCH_EVENTS: IntCounterVec = IntCounterVec::new(
        Opts::new("watch_events", "Node-changed events received, by entity kind"),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref CALLBACKS_INVOKED: IntCounterVec = IntCounterVec::new(
        Opts::new("callbacks_invoked", "Change callbacks invoked, by entity kind"),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref STALE_UPDATES_DISCARDED: IntCounterVec = IntCounterVec::new(
        Opts::new("stale_updates_discarded", "Values rejected by the store because a newer version was cached"),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref DISPATCH_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("dispatch_failures", "Watch refetches or decodes that failed and were skipped"),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref SESSION_RECONNECTS: IntCounter =
        IntCounter::new("session_reconnects", "Fresh coordination sessions opened after the first one")
            .expect("metric can not be created");

    pub static ref DIRECTORY_STATE: IntGauge =
        IntGauge::new("directory_state", "Current connection state (0=Init .. 5=Closed)")
            .expect("metric can not be created");
}

/// Register every directory collector into `registry`
pub fn register_custom_metrics(registry: &Registry) {
    registry
        .register(Box::new(WATCH_EVENTS.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(CALLBACKS_INVOKED.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(STALE_UPDATES_DISCARDED.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(DISPATCH_FAILURES.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(SESSION_RECONNECTS.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(DIRECTORY_STATE.clone()))
        .expect("collector can be registered");
}
