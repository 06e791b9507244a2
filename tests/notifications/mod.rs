use config_directory::register_custom_metrics;
use config_directory::ClusterConfig;
use config_directory::ConfigDirectory;
use config_directory::Entity;
use config_directory::NamespaceConfig;
use config_directory::InMemoryCoordinator;
use config_directory::TableDefinition;
use prometheus::Registry;

use crate::common::eventually;
use crate::common::recorder;
use crate::common::started;
use crate::common::table;

#[tokio::test]
async fn test_remote_updates_arrive_in_order() {
    let coordinator = InMemoryCoordinator::new();
    let a = started(&coordinator).await;
    let b = started(&coordinator).await;

    let (callback, seen) = recorder::<TableDefinition>();
    a.directory.set_table_config_change_callback(callback);

    let mut versions = Vec::new();
    let mut base = 0;
    for shards in 1..=10u32 {
        let mut next = table("ns", "hot").with_version(base);
        next.config.num_shards = Some(shards);
        base = b.directory.update_table_config(next, false).await.unwrap();
        versions.push(base);
    }

    let last = base;
    assert!(eventually(|| seen.lock().last() == Some(&last)).await);
    assert_eq!(*seen.lock(), versions);

    let cached = a.directory.get_table_config("ns", "hot").await.unwrap();
    assert_eq!(cached.config.num_shards, Some(10));
    a.directory.stop().await.unwrap();
    b.directory.stop().await.unwrap();
}

#[tokio::test]
async fn test_each_type_notifies_its_own_callback() {
    let coordinator = InMemoryCoordinator::new();
    let a = started(&coordinator).await;
    let b = started(&coordinator).await;

    let (cluster_cb, clusters) = recorder::<ClusterConfig>();
    let (namespace_cb, namespaces) = recorder::<NamespaceConfig>();
    let (table_cb, tables) = recorder::<TableDefinition>();
    a.directory.set_cluster_config_change_callback(cluster_cb);
    a.directory.set_namespace_config_change_callback(namespace_cb);
    a.directory.set_table_config_change_callback(table_cb);

    let mut cluster = b.directory.get_cluster_config().await.unwrap();
    cluster.replication_factor = 3;
    let cv = b.directory.update_cluster_config(cluster).await.unwrap();
    let nv = b.directory.update_namespace_config(NamespaceConfig::new("ns")).await.unwrap();
    let tv = b.directory.update_table_config(table("ns", "t"), false).await.unwrap();

    assert!(eventually(|| tables.lock().contains(&tv)).await);
    assert!(eventually(|| namespaces.lock().contains(&nv)).await);
    assert!(eventually(|| clusters.lock().contains(&cv)).await);
    assert_eq!(*clusters.lock(), vec![cv]);
    assert_eq!(*namespaces.lock(), vec![nv]);
    assert_eq!(*tables.lock(), vec![tv]);

    a.directory.stop().await.unwrap();
    b.directory.stop().await.unwrap();
}

#[tokio::test]
async fn test_callback_can_be_replaced_while_running() {
    let coordinator = InMemoryCoordinator::new();
    let p = started(&coordinator).await;

    let (first, first_seen) = recorder::<NamespaceConfig>();
    p.directory.set_namespace_config_change_callback(first);
    let v1 = p.directory.update_namespace_config(NamespaceConfig::new("ns")).await.unwrap();

    let (second, second_seen) = recorder::<NamespaceConfig>();
    p.directory.set_namespace_config_change_callback(second);
    let v2 = p
        .directory
        .update_namespace_config(NamespaceConfig::new("ns").with_version(v1))
        .await
        .unwrap();

    assert_eq!(*first_seen.lock(), vec![v1]);
    assert_eq!(*second_seen.lock(), vec![v2]);
    p.directory.stop().await.unwrap();
}

#[tokio::test]
async fn test_metrics_register_and_gather() {
    let coordinator = InMemoryCoordinator::new();
    let p = started(&coordinator).await;
    p.directory.update_namespace_config(NamespaceConfig::new("ns")).await.unwrap();

    let registry = Registry::new();
    register_custom_metrics(&registry);
    let names: Vec<String> = registry.gather().iter().map(|family| family.get_name().to_string()).collect();
    assert!(names.iter().any(|name| name == "directory_state"), "{names:?}");
    assert!(names.iter().any(|name| name == "callbacks_invoked" || name == "watch_events"), "{names:?}");
    p.directory.stop().await.unwrap();
}
