//! Subcommand execution against an open catalog.

use crate::args::{Cli, Command};
use std::io::Write;
use std::sync::Arc;
use tablecat_configs::CatalogConfig;
use tablecat_core::{
    CatalogOptions, FieldValue, Record, RecoveryReport, RecoveryScope, RowKeyRange, TableCatalog,
};
use tablecat_store::{RocksDBBackend, RocksDbInit};
use tokio_util::sync::CancellationToken;

/// Resolve configuration: file or environment, then command-line overrides.
pub fn load_config(cli: &Cli) -> anyhow::Result<CatalogConfig> {
    let mut config = match &cli.config {
        Some(path) => CatalogConfig::from_file(path)?,
        None => CatalogConfig::from_env()?,
    };

    if let Some(dir) = &cli.data_dir {
        config.storage.data_path = dir.clone();
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.to_lowercase();
    }
    config.validate()?;

    Ok(config)
}

/// Open the RocksDB-backed catalog described by `config`.
pub fn open_catalog(config: &CatalogConfig) -> anyhow::Result<TableCatalog> {
    let db = RocksDbInit::new(
        config.storage.data_path.clone(),
        config.catalog.table_name.clone(),
        config.storage.rocksdb.clone(),
    )
    .open()?;
    let backend = Arc::new(RocksDBBackend::new(db, config.catalog.table_name.clone()));
    let options = CatalogOptions::from_config(config)?;

    log::info!(
        "Opened catalog '{}' at {}",
        config.catalog.table_name,
        config.storage.data_path
    );
    Ok(TableCatalog::new(options, backend))
}

fn range(from: &Option<String>, to: &Option<String>) -> Option<RowKeyRange> {
    if from.is_none() && to.is_none() {
        return None;
    }
    Some(RowKeyRange {
        start: from.clone(),
        end: to.clone(),
    })
}

fn write_records(out: &mut impl Write, records: &[Record]) -> anyhow::Result<()> {
    for record in records {
        writeln!(out, "{}", serde_json::to_string(record)?)?;
    }
    Ok(())
}

fn report_json(report: &RecoveryReport) -> serde_json::Value {
    serde_json::json!({
        "scanned": report.scanned,
        "replayed": report.replayed,
        "checkpointed": report.checkpointed,
        "superseded": report.superseded,
        "still_pending": report.still_pending,
        "failures": report.failures,
    })
}

/// Run one subcommand, writing results as JSON lines to `out`.
pub async fn execute(
    catalog: &TableCatalog,
    command: &Command,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    match command {
        Command::Insert { record } => {
            let record: Record = serde_json::from_str(record)
                .map_err(|e| anyhow::anyhow!("--record must be a JSON object: {}", e))?;
            let committed = catalog.insert(record).await?;
            write_records(out, &[committed])?;
        },
        Command::Query { filters, from, to } => {
            let filters: Vec<(String, FieldValue)> = filters
                .iter()
                .map(|(field, value)| (field.clone(), FieldValue::from(value.as_str())))
                .collect();
            let records = catalog.query_where(&filters, range(from, to).as_ref()).await?;
            write_records(out, &records)?;
        },
        Command::Delete { filter, from, to } => {
            let (field, value) = filter;
            let value = FieldValue::from(value.as_str());
            let deleted = catalog.delete(field, &value, range(from, to).as_ref()).await?;
            write_records(out, &deleted)?;
        },
        Command::Recover { all, watch } => {
            if *watch && catalog.options().background_interval.is_none() {
                return Err(anyhow::anyhow!(
                    "--watch needs recovery.background_interval_secs greater than 0"
                ));
            }
            let scope = if *all {
                RecoveryScope::all()
            } else {
                RecoveryScope {
                    older_than: Some(catalog.options().recovery.grace_period),
                    max_entries: None,
                }
            };
            let report = catalog.recover(scope).await?;
            writeln!(out, "{}", report_json(&report))?;
            out.flush()?;

            if *watch {
                watch_until_interrupted(catalog).await?;
            }
        },
    }
    Ok(())
}

/// Run the configured background recovery loop until Ctrl-C.
async fn watch_until_interrupted(catalog: &TableCatalog) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    let handle = catalog
        .start_background_recovery(shutdown.clone())
        .ok_or_else(|| anyhow::anyhow!("background recovery is disabled"))?;

    tokio::signal::ctrl_c().await?;
    log::info!("Interrupted, stopping recovery loop");
    shutdown.cancel();
    handle.await?;
    Ok(())
}
