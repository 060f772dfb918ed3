//! Insert and delete protocol: encode, WAL append, fan out, checkpoint.

use crate::encoding::Encoder;
use crate::error::{CatalogError, Result};
use crate::fanout::FanoutExecutor;
use crate::recovery::RecoveryEngine;
use crate::record::Record;
use crate::wal::{WalEntry, WalManager, WalOperation};
use std::sync::Arc;

pub struct WriteOrchestrator {
    encoder: Encoder,
    wal: Arc<WalManager>,
    fanout: Arc<FanoutExecutor>,
    recovery: Arc<RecoveryEngine>,
}

impl WriteOrchestrator {
    pub fn new(
        encoder: Encoder,
        wal: Arc<WalManager>,
        fanout: Arc<FanoutExecutor>,
        recovery: Arc<RecoveryEngine>,
    ) -> Self {
        Self {
            encoder,
            wal,
            fanout,
            recovery,
        }
    }

    /// Upsert `record` into every index partition.
    ///
    /// On `PartialFanout` the WAL entry stays pending and a later recovery
    /// pass finishes the write; retrying the insert is also safe.
    pub async fn insert(&self, record: Record) -> Result<Record> {
        self.recovery.run_opportunistic().await;
        self.execute(WalOperation::Insert, record).await
    }

    /// Remove every index row of `record`.
    pub async fn delete(&self, record: Record) -> Result<Record> {
        self.recovery.run_opportunistic().await;
        self.execute(WalOperation::Delete, record).await
    }

    async fn execute(&self, operation: WalOperation, record: Record) -> Result<Record> {
        // Validation errors return before the WAL is touched
        let encoded = self.encoder.encode(&record)?;

        let entry = self
            .wal
            .append(operation, record, encoded.primary.fingerprint, encoded.targets)
            .await?;

        let report = self.fanout.apply(&entry).await;
        if !report.is_complete() {
            return Err(CatalogError::PartialFanout {
                operation_id: entry.operation_id,
                written: report.written.len(),
                total: report.total,
                failures: report.failure_messages(),
            });
        }

        self.finish(&entry).await;
        Ok(entry.record)
    }

    /// Checkpoint a fully applied entry together with every older entry
    /// for the same record, which it supersedes.
    ///
    /// The write already succeeded, so a failing checkpoint is not surfaced:
    /// the entry is flagged COMMITTED if possible and recovery removes it.
    /// It is also kept when older entries could not be dropped, so recovery
    /// still sees a newer entry for the fingerprint and skips the stale ones.
    async fn finish(&self, entry: &WalEntry) {
        let result = match self.wal.checkpoint_superseded(entry).await {
            Ok(removed) => {
                if removed > 0 {
                    log::debug!("[{}] Superseded {} older WAL entries", entry.operation_id, removed);
                }
                self.wal.checkpoint(entry).await
            },
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            log::warn!("[{}] Checkpoint failed, leaving entry for recovery: {}", entry.operation_id, e);
            if let Err(e) = self.wal.mark_committed(entry).await {
                log::warn!("[{}] Could not mark entry committed: {}", entry.operation_id, e);
            }
        }
    }
}
