use std::sync::Arc;
use std::time::Duration;

use config_directory::ChangeCallback;
use config_directory::ColumnDefinition;
use config_directory::ColumnType;
use config_directory::ConfigDirectory;
use config_directory::Directory;
use config_directory::DirectoryConfig;
use config_directory::Entity;
use config_directory::InMemoryClient;
use config_directory::InMemoryCoordinator;
use config_directory::TableConfig;
use config_directory::TableDefinition;
use parking_lot::Mutex;

pub const WAIT_FOR_CONVERGENCE: Duration = Duration::from_secs(2);

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    env_logger::init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for integration test.");
}

pub fn test_config() -> DirectoryConfig {
    let mut config = DirectoryConfig::default();
    config.cluster.cluster_name = "it".to_string();
    config.session.session_timeout_ms = 500;
    config.session.connect_timeout_ms = 200;
    config.session.request_timeout_ms = 200;
    config.session.wait_connected_timeout_ms = 2_000;
    config.session.startup_timeout_ms = 3_000;
    config.retry.connect.base_delay_ms = 5;
    config.retry.connect.max_delay_ms = 50;
    config.retry.load.base_delay_ms = 5;
    config.retry.load.max_delay_ms = 50;
    config.validate().expect("test config is valid")
}

/// One process attached to `coordinator`
pub struct Process {
    pub directory: Arc<Directory<InMemoryClient>>,
    pub client: Arc<InMemoryClient>,
}

pub fn process(coordinator: &InMemoryCoordinator) -> Process {
    enable_logger();
    let client = Arc::new(coordinator.client());
    let directory = Directory::new(test_config(), client.clone()).expect("directory can be created");
    Process {
        directory: Arc::new(directory),
        client,
    }
}

pub async fn started(coordinator: &InMemoryCoordinator) -> Process {
    let process = process(coordinator);
    process.directory.start().await.expect("directory starts");
    process
}

pub fn table(
    namespace: &str,
    name: &str,
) -> TableDefinition {
    TableDefinition::new(namespace, name).with_config(TableConfig {
        columns: vec![ColumnDefinition {
            name: "time".into(),
            column_type: ColumnType::DateTime,
            repeated: false,
            optional: false,
        }],
        primary_key: vec!["time".into()],
        ..Default::default()
    })
}

pub fn recorder<E: Entity>() -> (ChangeCallback<E>, Arc<Mutex<Vec<u64>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let callback: ChangeCallback<E> = Arc::new(move |value: &E| sink.lock().push(value.version()));
    (callback, seen)
}

pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT_FOR_CONVERGENCE;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Polls `directory` until its cached `(namespace, name)` carries `version`
pub async fn table_converges(
    directory: &Directory<InMemoryClient>,
    namespace: &str,
    name: &str,
    version: u64,
) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT_FOR_CONVERGENCE;
    while tokio::time::Instant::now() < deadline {
        if let Ok(cached) = directory.get_table_config(namespace, name).await {
            if cached.version == version {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}
