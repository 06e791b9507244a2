use config_directory::ConfigDirectory;
use config_directory::Entity;
use config_directory::Error;
use config_directory::InMemoryCoordinator;

use crate::common::started;
use crate::common::table;
use crate::common::table_converges;

#[tokio::test]
async fn test_two_processes_same_base_exactly_one_wins() {
    let coordinator = InMemoryCoordinator::new();
    let a = started(&coordinator).await;
    let b = started(&coordinator).await;

    let base = a.directory.update_table_config(table("ns", "events"), false).await.unwrap();
    assert!(table_converges(&b.directory, "ns", "events", base).await);

    let mut from_a = table("ns", "events").with_version(base);
    from_a.config.num_shards = Some(8);
    let mut from_b = table("ns", "events").with_version(base);
    from_b.config.num_shards = Some(16);

    let (ra, rb) = tokio::join!(
        a.directory.update_table_config(from_a, false),
        b.directory.update_table_config(from_b, false)
    );

    let (winner, loser) = match (ra, rb) {
        (Ok(v), Err(e)) | (Err(e), Ok(v)) => (v, e),
        other => panic!("expected exactly one winner, got {other:?}"),
    };
    assert!(matches!(loser, Error::WriteConflict { expected, .. } if expected == base));
    assert!(winner > base);

    assert!(table_converges(&a.directory, "ns", "events", winner).await);
    assert!(table_converges(&b.directory, "ns", "events", winner).await);

    a.directory.stop().await.unwrap();
    b.directory.stop().await.unwrap();
}

#[tokio::test]
async fn test_one_process_concurrent_same_base() {
    let coordinator = InMemoryCoordinator::new();
    let p = started(&coordinator).await;

    let base = p.directory.update_table_config(table("ns", "t"), false).await.unwrap();
    let (r1, r2) = tokio::join!(
        p.directory.update_table_config(table("ns", "t").with_version(base), false),
        p.directory.update_table_config(table("ns", "t").with_version(base), false)
    );

    let outcomes = [r1.is_ok(), r2.is_ok()];
    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1, "{outcomes:?}");
    p.directory.stop().await.unwrap();
}

#[tokio::test]
async fn test_force_always_succeeds() {
    let coordinator = InMemoryCoordinator::new();
    let a = started(&coordinator).await;
    let b = started(&coordinator).await;

    let mut last = a.directory.update_table_config(table("ns", "t"), false).await.unwrap();
    for i in 0..5u32 {
        // Bases that are unknown, stale or never stored
        let base = match i % 3 {
            0 => 0,
            1 => last.saturating_sub(1),
            _ => last + 100,
        };
        let mut forced = table("ns", "t").with_version(base);
        forced.config.num_shards = Some(i + 1);

        let writer = if i % 2 == 0 { &a } else { &b };
        let version = writer.directory.update_table_config(forced, true).await.unwrap();
        assert!(version > last);
        last = version;
    }

    let cached = a.directory.get_table_config("ns", "t").await.unwrap();
    assert!(cached.version <= last);
    a.directory.stop().await.unwrap();
    b.directory.stop().await.unwrap();
}

#[tokio::test]
async fn test_conflict_iff_base_differs_from_cached() {
    let coordinator = InMemoryCoordinator::new();
    let p = started(&coordinator).await;

    let v1 = p.directory.update_table_config(table("ns", "t"), false).await.unwrap();
    let v2 = p
        .directory
        .update_table_config(table("ns", "t").with_version(v1), false)
        .await
        .unwrap();

    for base in [0, v1, v2 + 1] {
        assert!(
            matches!(
                p.directory.update_table_config(table("ns", "t").with_version(base), false).await,
                Err(Error::WriteConflict { .. })
            ),
            "base {base} must conflict with cached {v2}"
        );
    }
    assert!(p
        .directory
        .update_table_config(table("ns", "t").with_version(v2), false)
        .await
        .is_ok());
    p.directory.stop().await.unwrap();
}
