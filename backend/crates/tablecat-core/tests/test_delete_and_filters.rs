//! Delete through the WAL and conjunctive multi-field lookups.

mod test_helpers;

use tablecat_core::{
    CatalogError, FieldValue, RecoveryScope, RowKeyRange, WalOperation, WAL_PARTITION,
};
use tablecat_store::Partition;
use test_helpers::*;

fn filters(pairs: &[(&str, &str)]) -> Vec<(String, FieldValue)> {
    pairs.iter().map(|(f, v)| (f.to_string(), FieldValue::from(*v))).collect()
}

#[tokio::test]
async fn test_delete_removes_every_index_row() {
    let (backend, catalog) = people_catalog();
    let alice = person("a@x", "555-0", "Alice", "2026-01-01T00:00:00Z");
    let bob = person("b@x", "555-0", "Bob", "2026-01-02T00:00:00Z");
    let carol = person("c@x", "555-9", "Carol", "2026-01-03T00:00:00Z");
    for record in [&alice, &bob, &carol] {
        catalog.insert(record.clone()).await.unwrap();
    }

    let deleted = catalog.delete("phone", &"555-0".into(), None).await.unwrap();
    assert_eq!(deleted, vec![alice, bob]);

    assert_eq!(
        backend.inner().partition_names(),
        vec!["4_nameCarol", "5_emailc@x", "5_phone555-9", "~fp"]
    );
    assert!(catalog.query("email", &"a@x".into(), None).await.unwrap().is_empty());
    assert_eq!(catalog.query("name", &"Carol".into(), None).await.unwrap(), vec![carol]);
}

#[tokio::test]
async fn test_delete_honors_range() {
    let (_backend, catalog) = people_catalog();
    let alice = person("a@x", "555-0", "Alice", "2026-01-01T00:00:00Z");
    let bob = person("b@x", "555-0", "Bob", "2026-01-02T00:00:00Z");
    catalog.insert(alice.clone()).await.unwrap();
    catalog.insert(bob.clone()).await.unwrap();

    let range = RowKeyRange::from("2026-01-02T00:00:00Z");
    let deleted = catalog.delete("phone", &"555-0".into(), Some(&range)).await.unwrap();
    assert_eq!(deleted, vec![bob]);
    assert_eq!(catalog.query("phone", &"555-0".into(), None).await.unwrap(), vec![alice]);
}

#[tokio::test]
async fn test_delete_of_nothing_is_empty() {
    let (_backend, catalog) = people_catalog();
    assert!(catalog.delete("email", &"nobody@x".into(), None).await.unwrap().is_empty());
    assert!(matches!(
        catalog.delete("age", &"1".into(), None).await,
        Err(CatalogError::UnknownField(_))
    ));
}

#[tokio::test]
async fn test_interrupted_delete_is_completed_by_recovery() {
    let (backend, catalog) = people_catalog();
    let alice = person("a@x", "555-0", "Alice", "2026-01-01T00:00:00Z");
    catalog.insert(alice.clone()).await.unwrap();

    backend.fail_deletes_where(|p| p.name() == "5_emaila@x");
    let err = catalog.delete("name", &"Alice".into(), None).await.unwrap_err();
    let operation_id = match err {
        CatalogError::PartialFanout { operation_id, written, total, .. } => {
            assert_eq!((written, total), (2, 3));
            operation_id
        },
        other => panic!("expected PartialFanout, got {:?}", other),
    };
    let entry = catalog.wal().get(&operation_id).await.unwrap().unwrap();
    assert_eq!(entry.operation, WalOperation::Delete);
    assert_eq!(entry.record, alice);

    backend.clear_faults();
    let report = catalog.recover(RecoveryScope::all()).await.unwrap();
    assert_eq!(report.checkpointed, 1);
    assert!(backend.inner().partition_names().is_empty());
    assert_eq!(backend.inner().row_count(&Partition::new(WAL_PARTITION)), 0);
}

#[tokio::test]
async fn test_query_where_intersects_filters() {
    let (_backend, catalog) = people_catalog();
    let alice = person("a@x", "555-0", "Alice", "2026-01-01T00:00:00Z");
    let bob = person("b@x", "555-0", "Bob", "2026-01-02T00:00:00Z");
    catalog.insert(alice.clone()).await.unwrap();
    catalog.insert(bob.clone()).await.unwrap();

    let hits = catalog
        .query_where(&filters(&[("phone", "555-0"), ("name", "Bob")]), None)
        .await
        .unwrap();
    assert_eq!(hits, vec![bob.clone()]);

    let hits = catalog.query_where(&filters(&[("phone", "555-0")]), None).await.unwrap();
    assert_eq!(hits, vec![alice.clone(), bob]);

    let hits = catalog
        .query_where(&filters(&[("email", "a@x"), ("name", "Bob")]), None)
        .await
        .unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn test_query_where_validates_before_scanning() {
    let (backend, catalog) = people_catalog();

    let err = catalog
        .query_where(&filters(&[("phone", "555-0"), ("age", "3")]), None)
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::UnknownField(ref f) if f == "age"));
    assert_eq!(backend.scan_calls(), 0);

    let err = catalog.query_where(&[], None).await.unwrap_err();
    assert!(matches!(err, CatalogError::InvalidQuery(_)));
}
