use std::sync::Arc;

use parking_lot::Mutex;

use crate::watch::ChangeCallback;
use crate::ColumnDefinition;
use crate::ColumnType;
use crate::Entity;
use crate::TableConfig;
use crate::TableDefinition;

pub fn sample_table(
    namespace: &str,
    table_name: &str,
) -> TableDefinition {
    TableDefinition::new(namespace, table_name).with_config(TableConfig {
        columns: vec![
            ColumnDefinition {
                name: "time".into(),
                column_type: ColumnType::DateTime,
                repeated: false,
                optional: false,
            },
            ColumnDefinition {
                name: "value".into(),
                column_type: ColumnType::Double,
                repeated: false,
                optional: true,
            },
        ],
        primary_key: vec!["time".into()],
        num_shards: Some(4),
        ..Default::default()
    })
}

/// Callback that records the version of every value it sees
pub fn version_recorder<E: Entity>() -> (ChangeCallback<E>, Arc<Mutex<Vec<u64>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let callback: ChangeCallback<E> = Arc::new(move |value: &E| sink.lock().push(value.version()));
    (callback, seen)
}
