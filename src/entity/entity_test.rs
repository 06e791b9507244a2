use super::*;
use crate::Error;

fn sample_table() -> TableDefinition {
    TableDefinition::new("acme", "events").with_config(TableConfig {
        columns: vec![
            ColumnDefinition {
                name: "time".into(),
                column_type: ColumnType::DateTime,
                repeated: false,
                optional: false,
            },
            ColumnDefinition {
                name: "session_id".into(),
                column_type: ColumnType::String,
                repeated: false,
                optional: true,
            },
        ],
        primary_key: vec!["time".into()],
        partitioner: Partitioner::TimeWindow,
        num_shards: Some(8),
        properties: Default::default(),
    })
}

#[test]
fn test_version_is_not_part_of_the_payload() {
    let table = sample_table().with_version(42);

    let bytes = table.encode().unwrap();
    let decoded = TableDefinition::decode(&bytes, 7).unwrap();

    assert_eq!(decoded.version, 7);
    assert_eq!(decoded.config, table.config);
    assert_eq!(decoded.with_version(42), table);
}

#[test]
fn test_decode_rejects_garbage() {
    let result = NamespaceConfig::decode(&[0xff, 0xff, 0xff], 1);
    assert!(matches!(result, Err(Error::Serialization(_))));
}

#[test]
fn test_cluster_config_default_is_valid_and_unversioned() {
    let config = ClusterConfig::default();

    assert_eq!(config.version(), 0);
    assert!(config.validate().is_ok());
    assert_eq!(config.key(), "cluster");
}

#[test]
fn test_cluster_config_validation() {
    let mut config = ClusterConfig {
        replication_factor: 0,
        ..Default::default()
    };
    assert!(matches!(config.validate(), Err(Error::InvalidArgument(_))));

    config.replication_factor = 2;
    let server = ServerConfig {
        server_id: "s1".into(),
        listen_addr: "10.0.0.1:9175".into(),
        status: ServerStatus::Up,
    };
    config.servers = vec![server.clone(), server];
    assert!(matches!(config.validate(), Err(Error::InvalidArgument(_))));

    config.servers.pop();
    assert!(config.validate().is_ok());
    assert_eq!(config.server("s1").map(|s| s.status), Some(ServerStatus::Up));
}

#[test]
fn test_namespace_validation() {
    assert!(NamespaceConfig::new("acme").validate().is_ok());
    assert!(NamespaceConfig::new("").validate().is_err());
    assert!(NamespaceConfig::new("ac/me").validate().is_err());
}

#[test]
fn test_table_validation() {
    assert!(sample_table().validate().is_ok());
    assert!(TableDefinition::new("", "events").validate().is_err());
    assert!(TableDefinition::new("acme", "").validate().is_err());

    let mut table = sample_table();
    table.config.primary_key = vec!["missing".into()];
    assert!(matches!(table.validate(), Err(Error::InvalidArgument(_))));

    let mut table = sample_table();
    table.config.num_shards = Some(0);
    assert!(table.validate().is_err());
}

#[test]
fn test_keys() {
    let table = sample_table();
    assert_eq!(table.key(), TableKey::new("acme", "events"));
    assert_eq!(table.key().to_string(), "acme/events");
    assert_eq!(NamespaceConfig::new("acme").key(), "acme");
    assert_eq!(EntityKind::Table.to_string(), "table");
}
