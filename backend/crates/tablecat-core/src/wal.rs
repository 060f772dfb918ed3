//! Write-ahead log for multi-partition fan-outs.
//!
//! Every insert or delete first persists its intent as a single row in the
//! reserved `~wal` partition. That one-row write is atomic in any partitioned
//! store, which is what makes the following multi-partition fan-out
//! recoverable: while the entry exists, the operation is unfinished.
//!
//! Entry ids start with a fixed-width UTC timestamp, so the partition scans
//! oldest first and an age cutoff is just an exclusive scan end key:
//!
//! ```text
//! ~wal  2026-01-01T00:00:00.000000Z_5b0c...  {"operation":"insert","status":"PENDING",...}
//! ```

use crate::encoding::IndexRowTarget;
use crate::error::{CatalogError, Result};
use crate::record::Record;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tablecat_store::{Partition, StorageBackend, StorageBackendAsync};
use uuid::Uuid;

/// Reserved partition holding WAL entries.
pub const WAL_PARTITION: &str = "~wal";

const ID_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalOperation {
    Insert,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WalStatus {
    /// Fan-out not confirmed complete
    Pending,
    /// Fan-out complete, only the checkpoint is outstanding
    Committed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    pub operation_id: String,
    pub operation: WalOperation,
    pub record: Record,
    pub fingerprint: String,
    pub target_rows: Vec<IndexRowTarget>,
    pub status: WalStatus,
    pub created_at: DateTime<Utc>,
}

/// Result of a pending-entry scan.
#[derive(Debug, Default)]
pub struct PendingEntries {
    /// Decoded entries, oldest first
    pub entries: Vec<WalEntry>,
    /// Rows that could not be decoded; left in place
    pub corrupt: Vec<CatalogError>,
}

fn operation_id(created_at: &DateTime<Utc>) -> String {
    format!("{}_{}", created_at.format(ID_TIME_FORMAT), Uuid::new_v4())
}

/// Appends, lists and checkpoints WAL entries.
pub struct WalManager {
    backend: Arc<dyn StorageBackend>,
    partition: Partition,
}

impl WalManager {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            partition: Partition::new(WAL_PARTITION),
        }
    }

    /// Persist a new PENDING entry with a single conditional write.
    ///
    /// Any failure surfaces as `WalAppendFailed`; nothing else has been
    /// written at that point.
    pub async fn append(
        &self,
        operation: WalOperation,
        record: Record,
        fingerprint: String,
        target_rows: Vec<IndexRowTarget>,
    ) -> Result<WalEntry> {
        let created_at = Utc::now();
        let entry = WalEntry {
            operation_id: operation_id(&created_at),
            operation,
            record,
            fingerprint,
            target_rows,
            status: WalStatus::Pending,
            created_at,
        };
        let bytes = serde_json::to_vec(&entry)
            .map_err(|e| CatalogError::WalAppendFailed(format!("encode entry: {}", e)))?;

        match self
            .backend
            .put_if_absent_async(&self.partition, entry.operation_id.as_bytes(), &bytes)
            .await
        {
            Ok(true) => {
                log::debug!(
                    "[WAL] appended {:?} {} ({} target rows)",
                    entry.operation,
                    entry.operation_id,
                    entry.target_rows.len()
                );
                Ok(entry)
            },
            Ok(false) => Err(CatalogError::WalAppendFailed(format!(
                "operation id {} already exists",
                entry.operation_id
            ))),
            Err(e) => Err(CatalogError::WalAppendFailed(e.to_string())),
        }
    }

    /// Entries not yet checkpointed, oldest first.
    ///
    /// `older_than` skips entries younger than the given age so a writer
    /// that is still fanning out is not raced. `limit` caps the decoded
    /// entries only: undecodable rows are reported but never use up the
    /// limit, so they cannot starve valid entries behind them.
    pub async fn list_pending(
        &self,
        older_than: Option<Duration>,
        limit: Option<usize>,
    ) -> Result<PendingEntries> {
        let end_key = match older_than {
            Some(age) => {
                let cutoff = chrono::Duration::from_std(age)
                    .ok()
                    .and_then(|age| Utc::now().checked_sub_signed(age));
                match cutoff {
                    Some(cutoff) => Some(cutoff.format(ID_TIME_FORMAT).to_string().into_bytes()),
                    // Nothing can be that old
                    None => return Ok(PendingEntries::default()),
                }
            },
            None => None,
        };

        let mut pending = PendingEntries::default();
        let mut start_key: Option<Vec<u8>> = None;
        loop {
            let page = limit.map(|limit| limit.saturating_sub(pending.entries.len()));
            if page == Some(0) {
                break;
            }
            let rows = self
                .backend
                .scan_async(&self.partition, start_key.take(), end_key.clone(), page)
                .await?;
            let fetched = rows.len();

            let mut last_key = None;
            for (key, value) in rows {
                match serde_json::from_slice::<WalEntry>(&value) {
                    Ok(entry) => pending.entries.push(entry),
                    Err(e) => pending.corrupt.push(CatalogError::CorruptWalEntry {
                        operation_id: String::from_utf8_lossy(&key).into_owned(),
                        reason: e.to_string(),
                    }),
                }
                last_key = Some(key);
            }

            // A short page means the range is exhausted
            match (page, last_key) {
                (Some(page), Some(mut key)) if fetched == page => {
                    key.push(0);
                    start_key = Some(key);
                },
                _ => break,
            }
        }
        Ok(pending)
    }

    /// Checkpoint every entry older than `entry` for the same record
    /// identity. Returns how many were removed.
    ///
    /// Called once `entry` is fully applied: its rows already reflect the
    /// latest intent for that fingerprint, so replaying an older entry
    /// afterwards would revert it.
    pub async fn checkpoint_superseded(&self, entry: &WalEntry) -> Result<usize> {
        let rows = self
            .backend
            .scan_async(&self.partition, None, Some(entry.operation_id.clone().into_bytes()), None)
            .await?;

        let mut removed = 0;
        for (key, value) in rows {
            let older = match serde_json::from_slice::<WalEntry>(&value) {
                Ok(older) => older,
                Err(_) => continue,
            };
            if older.fingerprint == entry.fingerprint {
                self.checkpoint_id(&older.operation_id).await?;
                log::debug!(
                    "[WAL] {} superseded by {}",
                    String::from_utf8_lossy(&key),
                    entry.operation_id
                );
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub async fn get(&self, operation_id: &str) -> Result<Option<WalEntry>> {
        match self.backend.get_async(&self.partition, operation_id.as_bytes()).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Remove the entry. Deleting an already-removed entry is not an error.
    pub async fn checkpoint(&self, entry: &WalEntry) -> Result<()> {
        self.checkpoint_id(&entry.operation_id).await
    }

    pub async fn checkpoint_id(&self, operation_id: &str) -> Result<()> {
        self.backend.delete_async(&self.partition, operation_id.as_bytes()).await?;
        log::debug!("[WAL] checkpointed {}", operation_id);
        Ok(())
    }

    /// Rewrite the entry as COMMITTED after a complete fan-out whose
    /// checkpoint failed. Recovery then only retries the checkpoint.
    pub async fn mark_committed(&self, entry: &WalEntry) -> Result<()> {
        let mut committed = entry.clone();
        committed.status = WalStatus::Committed;
        let bytes = serde_json::to_vec(&committed)?;
        self.backend
            .put_async(&self.partition, committed.operation_id.as_bytes(), &bytes)
            .await?;
        Ok(())
    }
}
