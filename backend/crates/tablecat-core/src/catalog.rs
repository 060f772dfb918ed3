//! `TableCatalog`: one configured catalog over one store.

use crate::encoding::Encoder;
use crate::error::{CatalogError, Result};
use crate::fanout::{FanoutExecutor, FanoutOptions};
use crate::query::{QueryEngine, RowKeyRange};
use crate::record::{FieldValue, Record};
use crate::recovery::{RecoveryEngine, RecoveryOptions, RecoveryReport, RecoveryScope};
use crate::schema::Schema;
use crate::wal::WalManager;
use crate::writer::WriteOrchestrator;
use std::sync::Arc;
use std::time::Duration;
use tablecat_configs::CatalogConfig;
use tablecat_store::StorageBackend;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Immutable settings of one catalog.
#[derive(Debug, Clone)]
pub struct CatalogOptions {
    pub schema: Arc<Schema>,
    pub fold_case: bool,
    pub fanout: FanoutOptions,
    pub recovery: RecoveryOptions,
    /// Period of the background recovery loop; `None` disables it
    pub background_interval: Option<Duration>,
}

impl CatalogOptions {
    /// Defaults for everything but the schema.
    pub fn new(schema: Schema) -> Self {
        Self {
            schema: Arc::new(schema),
            fold_case: false,
            fanout: FanoutOptions::default(),
            recovery: RecoveryOptions::default(),
            background_interval: None,
        }
    }

    pub fn with_fold_case(mut self, fold_case: bool) -> Self {
        self.fold_case = fold_case;
        self
    }

    pub fn with_fanout(mut self, fanout: FanoutOptions) -> Self {
        self.fanout = fanout;
        self
    }

    pub fn with_recovery(mut self, recovery: RecoveryOptions) -> Self {
        self.recovery = recovery;
        self
    }

    /// A zero interval disables the loop.
    pub fn with_background_interval(mut self, interval: Duration) -> Self {
        self.background_interval = (!interval.is_zero()).then_some(interval);
        self
    }

    pub fn from_config(config: &CatalogConfig) -> Result<Self> {
        let schema = Schema::new(
            config.catalog.index_keys.iter().cloned(),
            config.catalog.row_key.clone(),
        )?;
        Ok(Self::new(schema)
            .with_fold_case(config.catalog.fold_case)
            .with_fanout(FanoutOptions {
                max_concurrency: config.fanout.max_concurrency,
                write_timeout: Duration::from_millis(config.fanout.write_timeout_ms),
            })
            .with_recovery(RecoveryOptions {
                grace_period: Duration::from_millis(config.recovery.grace_period_ms),
                opportunistic_limit: config.recovery.opportunistic_limit,
                min_interval: Duration::from_millis(config.recovery.min_interval_ms),
            })
            .with_background_interval(Duration::from_secs(
                config.recovery.background_interval_secs,
            )))
    }
}

/// Multi-field index over a partition/row-key store.
///
/// ```rust,ignore
/// let schema = Schema::new(["email", "phone"], "created")?;
/// let catalog = TableCatalog::new(CatalogOptions::new(schema), Arc::new(InMemoryBackend::new()));
///
/// catalog.insert(Record::new()
///     .with("email", "a@x")
///     .with("phone", "555-1")
///     .with("created", "2026-01-01T00:00:00Z")).await?;
///
/// let hits = catalog.query("phone", &"555-1".into(), None).await?;
/// ```
pub struct TableCatalog {
    options: CatalogOptions,
    backend: Arc<dyn StorageBackend>,
    wal: Arc<WalManager>,
    writer: WriteOrchestrator,
    recovery: Arc<RecoveryEngine>,
    query: QueryEngine,
}

impl TableCatalog {
    pub fn new(options: CatalogOptions, backend: Arc<dyn StorageBackend>) -> Self {
        let encoder = Encoder::new(Arc::clone(&options.schema), options.fold_case);
        let wal = Arc::new(WalManager::new(Arc::clone(&backend)));
        let fanout = Arc::new(FanoutExecutor::new(Arc::clone(&backend), options.fanout.clone()));
        let recovery = Arc::new(RecoveryEngine::new(
            Arc::clone(&wal),
            Arc::clone(&fanout),
            options.recovery.clone(),
        ));
        let writer = WriteOrchestrator::new(
            encoder.clone(),
            Arc::clone(&wal),
            fanout,
            Arc::clone(&recovery),
        );
        let query = QueryEngine::new(encoder, Arc::clone(&backend));

        log::debug!(
            "Catalog ready on {} backend (index fields: {:?}, row key: {})",
            backend.backend_name(),
            options.schema.index_fields(),
            options.schema.row_key_field()
        );

        Self {
            options,
            backend,
            wal,
            writer,
            recovery,
            query,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.options.schema
    }

    pub fn options(&self) -> &CatalogOptions {
        &self.options
    }

    pub fn wal(&self) -> &WalManager {
        &self.wal
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// Idempotent upsert keyed by the record's indexed-field values.
    pub async fn insert(&self, record: Record) -> Result<Record> {
        self.writer.insert(record).await
    }

    pub async fn query(
        &self,
        field: &str,
        value: &FieldValue,
        range: Option<&RowKeyRange>,
    ) -> Result<Vec<Record>> {
        self.query.query(field, value, range).await
    }

    pub async fn query_where(
        &self,
        filters: &[(String, FieldValue)],
        range: Option<&RowKeyRange>,
    ) -> Result<Vec<Record>> {
        self.query.query_where(filters, range).await
    }

    /// Delete every record whose `field` equals `value`; returns them.
    ///
    /// Each record goes through its own WAL entry. The first failure stops
    /// the loop; records already handled stay deleted.
    pub async fn delete(
        &self,
        field: &str,
        value: &FieldValue,
        range: Option<&RowKeyRange>,
    ) -> Result<Vec<Record>> {
        let matches = self.query.query(field, value, range).await?;
        let mut deleted = Vec::with_capacity(matches.len());
        for record in matches {
            deleted.push(self.writer.delete(record).await?);
        }
        if !deleted.is_empty() {
            log::info!("Deleted {} record(s) matching {}={}", deleted.len(), field, value);
        }
        Ok(deleted)
    }

    pub async fn recover(&self, scope: RecoveryScope) -> Result<RecoveryReport> {
        self.recovery.recover_pending(scope).await
    }

    /// Background recovery every `interval`, honoring the grace period.
    pub fn spawn_recovery_loop(
        &self,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> Result<JoinHandle<()>> {
        if interval.is_zero() {
            return Err(CatalogError::InvalidQuery(
                "recovery interval must be greater than zero".to_string(),
            ));
        }
        Ok(Arc::clone(&self.recovery).spawn_loop(interval, shutdown))
    }

    /// Start the background loop at the configured interval, if any.
    pub fn start_background_recovery(&self, shutdown: CancellationToken) -> Option<JoinHandle<()>> {
        let interval = self.options.background_interval?;
        Some(Arc::clone(&self.recovery).spawn_loop(interval, shutdown))
    }
}
