//! Shared fixtures for catalog integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use tablecat_core::{CatalogOptions, Record, RecoveryOptions, Schema, TableCatalog};
use tablecat_store::test_utils::FaultInjectingBackend;

/// email, phone and name indexed; rows ordered by `created`.
pub fn people_schema() -> Schema {
    Schema::new(["email", "phone", "name"], "created").unwrap()
}

pub fn person(email: &str, phone: &str, name: &str, created: &str) -> Record {
    Record::new()
        .with("email", email)
        .with("phone", phone)
        .with("name", name)
        .with("created", created)
}

/// Recovery never runs on its own; tests call `recover` explicitly.
pub fn manual_recovery() -> RecoveryOptions {
    RecoveryOptions {
        grace_period: Duration::from_secs(3600),
        opportunistic_limit: 100,
        min_interval: Duration::from_secs(3600),
    }
}

/// Every write first replays whatever is pending.
pub fn eager_recovery() -> RecoveryOptions {
    RecoveryOptions {
        grace_period: Duration::ZERO,
        opportunistic_limit: 100,
        min_interval: Duration::ZERO,
    }
}

pub fn catalog_with(
    schema: Schema,
    recovery: RecoveryOptions,
) -> (Arc<FaultInjectingBackend>, TableCatalog) {
    catalog_with_options(CatalogOptions::new(schema).with_recovery(recovery))
}

pub fn catalog_with_options(options: CatalogOptions) -> (Arc<FaultInjectingBackend>, TableCatalog) {
    let backend = Arc::new(FaultInjectingBackend::new());
    let catalog = TableCatalog::new(options, backend.clone());
    (backend, catalog)
}

pub fn people_catalog() -> (Arc<FaultInjectingBackend>, TableCatalog) {
    catalog_with(people_schema(), manual_recovery())
}
