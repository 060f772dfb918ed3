//! Self-healing replay of unfinished WAL entries.
//!
//! Any crash or failure between WAL append and checkpoint leaves a PENDING
//! entry with everything needed to finish the job. Replay re-applies every
//! target row; row writes are deterministic and idempotent, so rows that
//! already landed are simply rewritten.
//!
//! Only the newest entry of a record identity is replayed. An older entry
//! for the same fingerprint describes an intent that a later insert or
//! delete overrides, so it is checkpointed without touching the rows.

use crate::error::{CatalogError, Result};
use crate::fanout::FanoutExecutor;
use crate::wal::{WalEntry, WalManager, WalStatus};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Which WAL entries a recovery pass considers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryScope {
    /// Only entries at least this old
    pub older_than: Option<Duration>,
    pub max_entries: Option<usize>,
}

impl RecoveryScope {
    /// Every pending entry regardless of age.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn opportunistic(grace: Duration, limit: usize) -> Self {
        Self {
            older_than: Some(grace),
            max_entries: Some(limit),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub scanned: usize,
    /// Entries whose fan-out was re-applied
    pub replayed: usize,
    pub checkpointed: usize,
    /// Entries dropped because a newer entry for the same record exists
    pub superseded: usize,
    /// Operation ids left in the WAL for a later pass
    pub still_pending: Vec<String>,
    pub failures: Vec<String>,
}

impl RecoveryReport {
    pub fn is_clean(&self) -> bool {
        self.still_pending.is_empty() && self.failures.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct RecoveryOptions {
    pub grace_period: Duration,
    pub opportunistic_limit: usize,
    pub min_interval: Duration,
}

impl Default for RecoveryOptions {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_millis(30_000),
            opportunistic_limit: 100,
            min_interval: Duration::from_millis(1_000),
        }
    }
}

pub struct RecoveryEngine {
    wal: Arc<WalManager>,
    fanout: Arc<FanoutExecutor>,
    options: RecoveryOptions,
    last_opportunistic: Mutex<Option<Instant>>,
}

impl RecoveryEngine {
    pub fn new(wal: Arc<WalManager>, fanout: Arc<FanoutExecutor>, options: RecoveryOptions) -> Self {
        Self {
            wal,
            fanout,
            options,
            last_opportunistic: Mutex::new(None),
        }
    }

    /// Replay and checkpoint every pending entry in `scope`, oldest first.
    ///
    /// Only a failure to list the WAL is returned as an error; per-entry
    /// problems are reported and the entry stays for a later pass.
    pub async fn recover_pending(&self, scope: RecoveryScope) -> Result<RecoveryReport> {
        let pending = self.wal.list_pending(scope.older_than, scope.max_entries).await?;
        let mut report = RecoveryReport {
            scanned: pending.entries.len() + pending.corrupt.len(),
            ..Default::default()
        };

        for err in pending.corrupt {
            log::warn!("[Recovery] {}", err);
            if let CatalogError::CorruptWalEntry { operation_id, .. } = &err {
                report.still_pending.push(operation_id.clone());
            }
            report.failures.push(err.to_string());
        }

        // Entries are oldest first, so the last id seen per fingerprint is the newest
        let newest: HashMap<&str, &str> = pending
            .entries
            .iter()
            .map(|entry| (entry.fingerprint.as_str(), entry.operation_id.as_str()))
            .collect();

        for entry in &pending.entries {
            if newest.get(entry.fingerprint.as_str()) != Some(&entry.operation_id.as_str()) {
                self.drop_superseded(entry, &mut report).await;
            } else {
                self.recover_entry(entry, &mut report).await;
            }
        }

        if report.scanned > 0 {
            log::info!(
                "[Recovery] scanned={} replayed={} checkpointed={} superseded={} still_pending={}",
                report.scanned,
                report.replayed,
                report.checkpointed,
                report.superseded,
                report.still_pending.len()
            );
        }
        Ok(report)
    }

    async fn recover_entry(&self, entry: &WalEntry, report: &mut RecoveryReport) {
        if entry.status == WalStatus::Pending {
            report.replayed += 1;
            let fanout = self.fanout.apply(entry).await;
            if !fanout.is_complete() {
                report.still_pending.push(entry.operation_id.clone());
                report.failures.extend(
                    fanout
                        .failure_messages()
                        .into_iter()
                        .map(|msg| format!("{}: {}", entry.operation_id, msg)),
                );
                return;
            }
        }

        match self.wal.checkpoint(entry).await {
            Ok(()) => report.checkpointed += 1,
            Err(e) => {
                report.still_pending.push(entry.operation_id.clone());
                report.failures.push(format!("{}: checkpoint failed: {}", entry.operation_id, e));
            },
        }
    }

    async fn drop_superseded(&self, entry: &WalEntry, report: &mut RecoveryReport) {
        match self.wal.checkpoint(entry).await {
            Ok(()) => {
                log::debug!("[Recovery] {} superseded by a newer entry", entry.operation_id);
                report.superseded += 1;
            },
            Err(e) => {
                report.still_pending.push(entry.operation_id.clone());
                report.failures.push(format!("{}: checkpoint failed: {}", entry.operation_id, e));
            },
        }
    }

    /// Bounded pass run before each write.
    ///
    /// Skipped when the previous pass ran less than `min_interval` ago.
    /// Never fails: problems are logged and the triggering write proceeds.
    pub async fn run_opportunistic(&self) -> Option<RecoveryReport> {
        {
            let mut last = self.last_opportunistic.lock();
            if let Some(at) = *last {
                if at.elapsed() < self.options.min_interval {
                    return None;
                }
            }
            *last = Some(Instant::now());
        }

        let scope =
            RecoveryScope::opportunistic(self.options.grace_period, self.options.opportunistic_limit);
        match self.recover_pending(scope).await {
            Ok(report) => {
                if !report.failures.is_empty() {
                    log::warn!(
                        "Opportunistic recovery left {} entries pending: {}",
                        report.still_pending.len(),
                        report.failures.join("; ")
                    );
                }
                Some(report)
            },
            Err(e) => {
                log::warn!("Opportunistic recovery failed: {}", e);
                None
            },
        }
    }

    /// Run a full-grace recovery pass every `interval` until `shutdown` fires.
    pub fn spawn_loop(
        self: Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            log::info!("Recovery loop started (interval: {:?})", interval);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        log::info!("Recovery loop stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let scope = RecoveryScope {
                            older_than: Some(self.options.grace_period),
                            max_entries: None,
                        };
                        if let Err(e) = self.recover_pending(scope).await {
                            log::warn!("Background recovery failed: {}", e);
                        }
                    }
                }
            }
        })
    }
}
