//! Bounded parallel application of a WAL entry's target rows.
//!
//! Rows live in independent partitions, so they are applied concurrently by
//! a `JoinSet` gated by a `Semaphore`. Every row write has its own deadline
//! and every failure is collected, so the caller learns exactly which rows
//! are missing.
//!
//! A record re-inserted under a new row key must replace its old rows. The
//! row keys an identity may still be stored under are kept in one pointer
//! row per fingerprint in the reserved `~fp` partition:
//!
//! ```text
//! ~fp  3fa1c29e  {"row_keys":["2026-01-05T00:00:00Z_3fa1c29e"]}
//! ```
//!
//! The new row key is added to the pointer before any index row is touched
//! and the pointer is narrowed to it (or removed, for a delete) only after
//! every row landed, so a replay always knows which old rows to drop.

use crate::encoding::IndexRowTarget;
use crate::wal::{WalEntry, WalOperation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tablecat_store::{Partition, StorageBackend, StorageBackendAsync, StorageError};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Reserved partition holding one identity pointer per fingerprint.
pub const IDENTITY_PARTITION: &str = "~fp";

#[derive(Debug, Clone)]
pub struct FanoutOptions {
    pub max_concurrency: usize,
    pub write_timeout: Duration,
}

impl Default for FanoutOptions {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            write_timeout: Duration::from_millis(5_000),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFailure {
    pub partition_key: String,
    pub row_key: String,
    pub reason: String,
}

impl std::fmt::Display for RowFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}: {}", self.partition_key, self.row_key, self.reason)
    }
}

/// Outcome of one fan-out.
#[derive(Debug, Clone, Default)]
pub struct FanoutReport {
    pub total: usize,
    /// Partition keys whose row was applied
    pub written: Vec<String>,
    pub failures: Vec<RowFailure>,
}

impl FanoutReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.written.len() == self.total
    }

    pub fn failure_messages(&self) -> Vec<String> {
        self.failures.iter().map(ToString::to_string).collect()
    }
}

/// Row keys one record identity may currently occupy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct IdentityPointer {
    row_keys: Vec<String>,
}

/// Pointer state as seen by one fan-out.
struct OpenIdentity {
    /// Row keys other than the entry's own that must be dropped
    stale: Vec<String>,
    /// Pointer already equals exactly the entry's row key
    settled: bool,
}

pub struct FanoutExecutor {
    backend: Arc<dyn StorageBackend>,
    identity: Partition,
    options: FanoutOptions,
}

impl FanoutExecutor {
    pub fn new(backend: Arc<dyn StorageBackend>, options: FanoutOptions) -> Self {
        Self {
            backend,
            identity: Partition::new(IDENTITY_PARTITION),
            options,
        }
    }

    /// Apply every target row of `entry`: upsert for inserts, removal for
    /// deletes. Never fails as a whole; see [`FanoutReport`].
    pub async fn apply(&self, entry: &WalEntry) -> FanoutReport {
        let total = entry.target_rows.len();
        let mut report = FanoutReport {
            total,
            ..Default::default()
        };
        // Every target of one entry shares the row key
        let row_key = match entry.target_rows.first() {
            Some(target) => target.row_key.clone(),
            None => return report,
        };

        let identity = match self.open_identity(entry, &row_key).await {
            Ok(identity) => identity,
            Err(e) => {
                log::warn!(
                    "[{}] Identity pointer {} unavailable: {}",
                    entry.operation_id,
                    entry.fingerprint,
                    e
                );
                report.failures = entry
                    .target_rows
                    .iter()
                    .map(|target| RowFailure {
                        partition_key: target.partition_key.clone(),
                        row_key: target.row_key.clone(),
                        reason: format!("identity pointer: {}", e),
                    })
                    .collect();
                return report;
            },
        };

        let stale = Arc::new(identity.stale);
        let semaphore = Arc::new(Semaphore::new(self.options.max_concurrency.max(1)));
        let mut join_set = JoinSet::new();

        for (index, target) in entry.target_rows.iter().cloned().enumerate() {
            let backend = Arc::clone(&self.backend);
            let semaphore = Arc::clone(&semaphore);
            let stale = Arc::clone(&stale);
            let operation = entry.operation;
            let deadline = self.options.write_timeout;

            join_set.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => return (index, target, Err(StorageError::Other(e.to_string()))),
                };
                let write = apply_row(&backend, operation, &target, &stale);
                let result = match tokio::time::timeout(deadline, write).await {
                    Ok(result) => result,
                    Err(_) => Err(StorageError::Timeout(format!(
                        "row write exceeded {}ms",
                        deadline.as_millis()
                    ))),
                };
                (index, target, result)
            });
        }

        let mut unfinished: BTreeSet<usize> = (0..total).collect();

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, target, Ok(()))) => {
                    unfinished.remove(&index);
                    report.written.push(target.partition_key);
                },
                Ok((index, target, Err(e))) => {
                    unfinished.remove(&index);
                    report.failures.push(RowFailure {
                        partition_key: target.partition_key,
                        row_key: target.row_key,
                        reason: e.to_string(),
                    });
                },
                Err(e) => log::error!("[{}] Fan-out task panicked: {}", entry.operation_id, e),
            }
        }

        for index in unfinished {
            let target = &entry.target_rows[index];
            report.failures.push(RowFailure {
                partition_key: target.partition_key.clone(),
                row_key: target.row_key.clone(),
                reason: "write task did not finish".to_string(),
            });
        }

        if report.is_complete() {
            if let Err(e) = self.close_identity(entry, &row_key, identity.settled).await {
                report.failures.push(RowFailure {
                    partition_key: IDENTITY_PARTITION.to_string(),
                    row_key: entry.fingerprint.clone(),
                    reason: e.to_string(),
                });
            }
        }

        if !report.is_complete() {
            log::warn!(
                "[{}] Fan-out {:?} applied {}/{} rows",
                entry.operation_id,
                entry.operation,
                report.written.len(),
                total
            );
        }
        report
    }

    /// Read the identity pointer and, for an insert, record `row_key` in it
    /// before any index row is written.
    async fn open_identity(
        &self,
        entry: &WalEntry,
        row_key: &str,
    ) -> Result<OpenIdentity, StorageError> {
        let key = entry.fingerprint.as_bytes();
        let mut pointer = match self.backend.get_async(&self.identity, key).await? {
            Some(bytes) => serde_json::from_slice::<IdentityPointer>(&bytes).unwrap_or_else(|e| {
                log::warn!("Ignoring unreadable identity pointer {}: {}", entry.fingerprint, e);
                IdentityPointer::default()
            }),
            None => IdentityPointer::default(),
        };

        let stale: Vec<String> =
            pointer.row_keys.iter().filter(|k| k.as_str() != row_key).cloned().collect();

        if entry.operation == WalOperation::Insert
            && !pointer.row_keys.iter().any(|k| k.as_str() == row_key)
        {
            pointer.row_keys.push(row_key.to_string());
            self.put_pointer(key, &pointer).await?;
        }

        Ok(OpenIdentity {
            settled: stale.is_empty(),
            stale,
        })
    }

    /// Narrow the pointer to the surviving row key, or drop it after a delete.
    async fn close_identity(
        &self,
        entry: &WalEntry,
        row_key: &str,
        settled: bool,
    ) -> Result<(), StorageError> {
        let key = entry.fingerprint.as_bytes();
        match entry.operation {
            WalOperation::Insert if settled => Ok(()),
            WalOperation::Insert => {
                let pointer = IdentityPointer {
                    row_keys: vec![row_key.to_string()],
                };
                self.put_pointer(key, &pointer).await
            },
            WalOperation::Delete => self.backend.delete_async(&self.identity, key).await,
        }
    }

    async fn put_pointer(&self, key: &[u8], pointer: &IdentityPointer) -> Result<(), StorageError> {
        let bytes =
            serde_json::to_vec(pointer).map_err(|e| StorageError::Other(e.to_string()))?;
        self.backend.put_async(&self.identity, key, &bytes).await
    }
}

async fn apply_row(
    backend: &Arc<dyn StorageBackend>,
    operation: WalOperation,
    target: &IndexRowTarget,
    stale: &[String],
) -> Result<(), StorageError> {
    let partition = target.partition();
    // Put before sweeping: a failure leaves a duplicate, never zero rows
    match operation {
        WalOperation::Insert => {
            backend
                .put_async(&partition, target.row_key.as_bytes(), target.payload.as_bytes())
                .await?
        },
        WalOperation::Delete => backend.delete_async(&partition, target.row_key.as_bytes()).await?,
    }
    for old in stale {
        log::debug!("Superseding row {} in {}", old, partition);
        backend.delete_async(&partition, old.as_bytes()).await?;
    }
    Ok(())
}
