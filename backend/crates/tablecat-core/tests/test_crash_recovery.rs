//! Self-healing of interrupted fan-outs.

mod test_helpers;

use std::time::Duration;
use tablecat_core::{
    CatalogError, CatalogOptions, FanoutOptions, RecoveryScope, WalStatus, WAL_PARTITION,
};
use tablecat_store::Partition;
use test_helpers::*;
use tokio_util::sync::CancellationToken;

const FIELDS: [&str; 3] = ["email", "phone", "name"];

async fn assert_findable_by_every_field(
    catalog: &tablecat_core::TableCatalog,
    record: &tablecat_core::Record,
) {
    for field in FIELDS {
        let value = record.get(field).unwrap();
        let hits = catalog.query(field, value, None).await.unwrap();
        assert_eq!(hits, vec![record.clone()], "lookup by {}", field);
    }
}

#[tokio::test]
async fn test_crash_after_k_minus_one_rows_is_replayed() {
    let (backend, catalog) = people_catalog();
    let alice = person("a@x", "555-1", "Alice", "2026-01-01T00:00:00Z");
    let k = FIELDS.len();

    // WAL append and identity pointer land, then only k-1 index rows do
    backend.fail_puts_after(k + 1);
    let operation_id = match catalog.insert(alice.clone()).await.unwrap_err() {
        CatalogError::PartialFanout {
            operation_id,
            written,
            total,
            ..
        } => {
            assert_eq!((written, total), (k - 1, k));
            operation_id
        },
        other => panic!("expected PartialFanout, got {:?}", other),
    };

    let mut unreachable = 0;
    for field in FIELDS {
        if catalog.query(field, alice.get(field).unwrap(), None).await.unwrap().is_empty() {
            unreachable += 1;
        }
    }
    assert_eq!(unreachable, 1);

    backend.clear_faults();
    let report = catalog.recover(RecoveryScope::all()).await.unwrap();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.replayed, 1);
    assert_eq!(report.checkpointed, 1);
    assert!(report.is_clean());

    assert!(catalog.wal().get(&operation_id).await.unwrap().is_none());
    assert_findable_by_every_field(&catalog, &alice).await;
}

#[tokio::test]
async fn test_partial_fanout_is_reported_and_recovered() {
    let (backend, catalog) = people_catalog();
    let alice = person("a@x", "555-1", "Alice", "2026-01-01T00:00:00Z");
    backend.fail_puts_where(|p| p.name() == "5_phone555-1");

    let err = catalog.insert(alice.clone()).await.unwrap_err();
    let operation_id = match err {
        CatalogError::PartialFanout {
            operation_id,
            written,
            total,
            failures,
        } => {
            assert_eq!((written, total), (2, 3));
            assert_eq!(failures.len(), 1);
            assert!(failures[0].starts_with("5_phone555-1/"));
            operation_id
        },
        other => panic!("expected PartialFanout, got {:?}", other),
    };

    let pending = catalog.wal().get(&operation_id).await.unwrap().unwrap();
    assert_eq!(pending.status, WalStatus::Pending);

    // Still broken: recovery reports, keeps the entry, does not fail
    let report = catalog.recover(RecoveryScope::all()).await.unwrap();
    assert_eq!(report.still_pending, vec![operation_id.clone()]);

    backend.clear_faults();
    let report = catalog.recover(RecoveryScope::all()).await.unwrap();
    assert_eq!(report.checkpointed, 1);
    assert_eq!(backend.inner().row_count(&Partition::new(WAL_PARTITION)), 0);
    assert_findable_by_every_field(&catalog, &alice).await;
}

#[tokio::test]
async fn test_timed_out_row_write_is_left_for_recovery() {
    let (backend, catalog) = catalog_with_options(
        CatalogOptions::new(people_schema())
            .with_recovery(manual_recovery())
            .with_fanout(FanoutOptions {
                write_timeout: Duration::from_millis(20),
                ..Default::default()
            }),
    );
    let alice = person("a@x", "555-1", "Alice", "2026-01-01T00:00:00Z");
    backend.delay_puts_where(|p| p.name() == "5_phone555-1", Duration::from_millis(200));

    let operation_id = match catalog.insert(alice.clone()).await.unwrap_err() {
        CatalogError::PartialFanout {
            operation_id,
            written,
            total,
            failures,
        } => {
            assert_eq!((written, total), (2, 3));
            assert_eq!(failures.len(), 1);
            assert!(failures[0].starts_with("5_phone555-1/"));
            assert!(failures[0].contains("Timed out"), "{}", failures[0]);
            operation_id
        },
        other => panic!("expected PartialFanout, got {:?}", other),
    };
    let pending = catalog.wal().get(&operation_id).await.unwrap().unwrap();
    assert_eq!(pending.status, WalStatus::Pending);

    backend.clear_faults();
    let report = catalog.recover(RecoveryScope::all()).await.unwrap();
    assert_eq!(report.checkpointed, 1);
    assert!(report.is_clean());
    assert_findable_by_every_field(&catalog, &alice).await;
}

#[tokio::test]
async fn test_recovery_does_not_resurrect_deleted_record() {
    let (backend, catalog) = people_catalog();
    let alice = person("a@x", "555-1", "Alice", "2026-01-01T00:00:00Z");

    backend.fail_puts_where(|p| p.name() == "4_nameAlice");
    assert!(matches!(
        catalog.insert(alice.clone()).await,
        Err(CatalogError::PartialFanout { .. })
    ));
    backend.clear_faults();

    // Distinct microseconds keep WAL ids in operation order
    tokio::time::sleep(Duration::from_millis(2)).await;
    let deleted = catalog.delete("email", &"a@x".into(), None).await.unwrap();
    assert_eq!(deleted, vec![alice.clone()]);

    let report = catalog.recover(RecoveryScope::all()).await.unwrap();
    assert_eq!(report.replayed, 0);
    assert!(report.is_clean());

    for field in FIELDS {
        let hits = catalog.query(field, alice.get(field).unwrap(), None).await.unwrap();
        assert!(hits.is_empty(), "lookup by {} found {:?}", field, hits);
    }
    assert!(backend.inner().partition_names().is_empty());
}

#[tokio::test]
async fn test_newer_insert_wins_over_stale_pending_entry() {
    let (backend, catalog) = people_catalog();
    let first = person("a@x", "555-1", "Alice", "2026-01-01T00:00:00Z").with("note", "v1");
    let second = person("a@x", "555-1", "Alice", "2026-01-05T00:00:00Z").with("note", "v2");

    backend.fail_puts_where(|p| p.name() == "4_nameAlice");
    assert!(catalog.insert(first).await.is_err());
    backend.clear_faults();

    tokio::time::sleep(Duration::from_millis(2)).await;
    catalog.insert(second.clone()).await.unwrap();
    assert_eq!(backend.inner().row_count(&Partition::new(WAL_PARTITION)), 0);

    let report = catalog.recover(RecoveryScope::all()).await.unwrap();
    assert!(report.is_clean());
    assert_findable_by_every_field(&catalog, &second).await;
}

#[tokio::test]
async fn test_recovery_replays_only_newest_of_two_pending_entries() {
    let (backend, catalog) = people_catalog();
    let first = person("a@x", "555-1", "Alice", "2026-01-01T00:00:00Z").with("note", "v1");
    let second = person("a@x", "555-1", "Alice", "2026-01-05T00:00:00Z").with("note", "v2");

    backend.fail_puts_where(|p| p.name() == "4_nameAlice");
    assert!(catalog.insert(first).await.is_err());
    tokio::time::sleep(Duration::from_millis(2)).await;
    backend.fail_puts_where(|p| p.name() == "5_phone555-1");
    assert!(catalog.insert(second.clone()).await.is_err());
    backend.clear_faults();

    let report = catalog.recover(RecoveryScope::all()).await.unwrap();
    assert_eq!(report.scanned, 2);
    assert_eq!(report.superseded, 1);
    assert_eq!(report.replayed, 1);
    assert_eq!(report.checkpointed, 1);
    assert_eq!(backend.inner().row_count(&Partition::new(WAL_PARTITION)), 0);
    assert_findable_by_every_field(&catalog, &second).await;
}

#[tokio::test]
async fn test_next_write_heals_orphaned_entry() {
    let (backend, catalog) = catalog_with(people_schema(), eager_recovery());
    let alice = person("a@x", "555-1", "Alice", "2026-01-01T00:00:00Z");
    let bob = person("b@x", "555-2", "Bob", "2026-01-02T00:00:00Z");

    backend.fail_puts_where(|p| p.name() == "4_nameAlice");
    assert!(catalog.insert(alice.clone()).await.is_err());
    backend.clear_faults();

    // The orphaned entry must be older than the zero grace cutoff
    tokio::time::sleep(Duration::from_millis(5)).await;
    catalog.insert(bob.clone()).await.unwrap();

    assert_eq!(backend.inner().row_count(&Partition::new(WAL_PARTITION)), 0);
    assert_findable_by_every_field(&catalog, &alice).await;
    assert_findable_by_every_field(&catalog, &bob).await;
}

#[tokio::test]
async fn test_grace_period_protects_in_flight_entries() {
    let (backend, catalog) = people_catalog();
    backend.fail_puts_where(|p| p.name() == "4_nameAlice");
    assert!(catalog
        .insert(person("a@x", "555-1", "Alice", "2026-01-01T00:00:00Z"))
        .await
        .is_err());
    backend.clear_faults();

    let scope = RecoveryScope::opportunistic(Duration::from_secs(3600), 10);
    let report = catalog.recover(scope).await.unwrap();
    assert_eq!(report.scanned, 0);
    assert_eq!(backend.inner().row_count(&Partition::new(WAL_PARTITION)), 1);
}

#[tokio::test]
async fn test_recovery_respects_max_entries() {
    let (backend, catalog) = people_catalog();
    backend.fail_puts_where(|p| p.name().starts_with("4_name"));
    for (i, name) in ["Alice", "Bob", "Carol"].iter().enumerate() {
        let record = person(&format!("{}@x", i), &format!("555-{}", i), name, "2026-01-01T00:00:00Z");
        assert!(catalog.insert(record).await.is_err());
    }
    backend.clear_faults();

    let scope = tablecat_core::RecoveryScope {
        older_than: None,
        max_entries: Some(2),
    };
    let report = catalog.recover(scope).await.unwrap();
    assert_eq!(report.checkpointed, 2);
    assert_eq!(backend.inner().row_count(&Partition::new(WAL_PARTITION)), 1);

    let report = catalog.recover(RecoveryScope::all()).await.unwrap();
    assert_eq!(report.checkpointed, 1);
}

#[tokio::test]
async fn test_background_loop_drains_wal() {
    let (backend, catalog) = catalog_with(people_schema(), eager_recovery());
    let alice = person("a@x", "555-1", "Alice", "2026-01-01T00:00:00Z");
    backend.fail_puts_where(|p| p.name() == "5_emaila@x");
    assert!(catalog.insert(alice.clone()).await.is_err());
    backend.clear_faults();

    let shutdown = CancellationToken::new();
    let handle = catalog
        .spawn_recovery_loop(Duration::from_millis(10), shutdown.clone())
        .unwrap();

    let mut drained = false;
    for _ in 0..200 {
        if backend.inner().row_count(&Partition::new(WAL_PARTITION)) == 0 {
            drained = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    shutdown.cancel();
    handle.await.unwrap();

    assert!(drained);
    assert_findable_by_every_field(&catalog, &alice).await;
}

#[tokio::test]
async fn test_configured_background_interval_starts_loop() {
    let (_backend, catalog) = people_catalog();
    assert!(catalog.start_background_recovery(CancellationToken::new()).is_none());

    let (backend, catalog) = catalog_with_options(
        CatalogOptions::new(people_schema())
            .with_recovery(eager_recovery())
            .with_background_interval(Duration::from_millis(10)),
    );
    let alice = person("a@x", "555-1", "Alice", "2026-01-01T00:00:00Z");
    backend.fail_puts_where(|p| p.name() == "5_phone555-1");
    assert!(catalog.insert(alice.clone()).await.is_err());
    backend.clear_faults();

    let shutdown = CancellationToken::new();
    let handle = catalog.start_background_recovery(shutdown.clone()).unwrap();
    let mut drained = false;
    for _ in 0..200 {
        if backend.inner().row_count(&Partition::new(WAL_PARTITION)) == 0 {
            drained = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    shutdown.cancel();
    handle.await.unwrap();

    assert!(drained);
    assert_findable_by_every_field(&catalog, &alice).await;
}

#[tokio::test]
async fn test_zero_interval_loop_is_rejected() {
    let (_backend, catalog) = people_catalog();
    assert!(catalog
        .spawn_recovery_loop(Duration::ZERO, CancellationToken::new())
        .is_err());
}
