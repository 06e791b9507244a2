use std::time::Duration;

use crate::DirectoryConfig;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    env_logger::init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for unit test.");
}

/// Defaults shrunk so state transitions happen within a test's lifetime
pub fn test_config() -> DirectoryConfig {
    let mut config = DirectoryConfig::default();
    config.cluster.cluster_name = "unit".to_string();
    config.session.session_timeout_ms = 300;
    config.session.connect_timeout_ms = 200;
    config.session.request_timeout_ms = 200;
    config.session.wait_connected_timeout_ms = 1000;
    config.session.startup_timeout_ms = 2000;
    config.retry.connect.base_delay_ms = 5;
    config.retry.connect.max_delay_ms = 50;
    config.retry.load.base_delay_ms = 5;
    config.retry.load.max_delay_ms = 50;
    config.watch.dispatch_queue_size = 64;
    config
}

/// Poll `condition` every few milliseconds until it holds or `limit` elapses
pub async fn eventually(
    limit: Duration,
    mut condition: impl FnMut() -> bool,
) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
