use std::time::Duration;

use config_directory::ConfigDirectory;
use config_directory::ConnectionState::*;
use config_directory::Entity;
use config_directory::Error;
use config_directory::InMemoryCoordinator;
use config_directory::NamespaceConfig;

use crate::common::eventually;
use crate::common::process;
use crate::common::recorder;
use crate::common::started;
use crate::common::table;
use crate::common::table_converges;

#[tokio::test]
async fn test_startup_sequence_is_exact() {
    let coordinator = InMemoryCoordinator::new();
    let p = process(&coordinator);
    let mut transitions = p.directory.subscribe_transitions();

    p.directory.start().await.unwrap();
    p.directory.stop().await.unwrap();

    let mut seen = Vec::new();
    while let Ok(t) = transitions.try_recv() {
        seen.push(t);
    }
    assert_eq!(
        seen,
        vec![
            (Init, Connecting),
            (Connecting, Loading),
            (Loading, Connected),
            (Connected, Closed)
        ]
    );
}

#[tokio::test]
async fn test_empty_cluster_namespace_scenario() {
    let coordinator = InMemoryCoordinator::new();
    let p = started(&coordinator).await;

    let ns1 = NamespaceConfig::new("ns1").with_property("plan", "enterprise");
    let version = p.directory.update_namespace_config(ns1.clone()).await.unwrap();

    let cached = p.directory.get_namespace_config("ns1").await.unwrap();
    assert_eq!(cached.customer, ns1.customer);
    assert_eq!(cached.properties, ns1.properties);
    assert_eq!(cached.version, version);

    assert!(matches!(
        p.directory.get_namespace_config("ns2").await,
        Err(Error::NotFound { .. })
    ));
    p.directory.stop().await.unwrap();
}

#[tokio::test]
async fn test_outage_and_recovery_of_every_process() {
    let coordinator = InMemoryCoordinator::new();
    let a = started(&coordinator).await;
    let b = started(&coordinator).await;

    coordinator.set_reachable(false);
    assert!(eventually(|| a.directory.state() == ConnectionLost && b.directory.state() == ConnectionLost).await);

    // Writes issued during the outage wait for recovery
    let writer = {
        let directory = a.directory.clone();
        tokio::spawn(async move { directory.update_table_config(table("ns", "t"), false).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    coordinator.set_reachable(true);

    let version = writer.await.unwrap().unwrap();
    assert!(
        table_converges(&b.directory, "ns", "t", version).await,
        "second process never observed version {version}"
    );

    a.directory.stop().await.unwrap();
    b.directory.stop().await.unwrap();
}

#[tokio::test]
async fn test_nothing_after_stop() {
    let coordinator = InMemoryCoordinator::new();
    let a = started(&coordinator).await;
    let b = started(&coordinator).await;

    let (callback, seen) = recorder::<NamespaceConfig>();
    a.directory.set_namespace_config_change_callback(callback);
    let v1 = b.directory.update_namespace_config(NamespaceConfig::new("ns")).await.unwrap();
    assert!(eventually(|| seen.lock().contains(&v1)).await);

    a.directory.stop().await.unwrap();
    let before = seen.lock().len();

    let mut base = v1;
    for _ in 0..5 {
        base = b
            .directory
            .update_namespace_config(NamespaceConfig::new("ns").with_version(base))
            .await
            .unwrap();
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(seen.lock().len(), before);

    assert!(matches!(a.directory.get_cluster_config().await, Err(Error::Closed)));
    assert!(matches!(a.directory.get_namespace_config("ns").await, Err(Error::Closed)));
    assert!(matches!(
        a.directory.update_namespace_config(NamespaceConfig::new("other")).await,
        Err(Error::Closed)
    ));
    assert!(matches!(a.directory.start().await, Err(Error::Closed)));
    b.directory.stop().await.unwrap();
}

#[tokio::test]
async fn test_second_start_is_rejected() {
    let coordinator = InMemoryCoordinator::new();
    let p = started(&coordinator).await;
    assert!(matches!(p.directory.start().await, Err(Error::AlreadyStarted)));
    p.directory.stop().await.unwrap();
}
