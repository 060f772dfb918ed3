//! RocksDB initialization utilities for the catalog.
//!
//! Provides a thin helper to open a RocksDB instance with the catalog's
//! column family present.

use anyhow::Result;
use rocksdb::{BlockBasedOptions, Cache, ColumnFamilyDescriptor, Options, DB};
use std::path::Path;
use std::sync::Arc;
use tablecat_configs::RocksDbSettings;

/// RocksDB initializer for creating/opening a catalog database.
pub struct RocksDbInit {
    db_path: String,
    table_name: String,
    settings: RocksDbSettings,
}

impl RocksDbInit {
    /// Create a new initializer for the given path with custom settings.
    pub fn new(
        db_path: impl Into<String>,
        table_name: impl Into<String>,
        settings: RocksDbSettings,
    ) -> Self {
        Self {
            db_path: db_path.into(),
            table_name: table_name.into(),
            settings,
        }
    }

    /// Create a new initializer with default settings.
    pub fn with_defaults(db_path: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self::new(db_path, table_name, RocksDbSettings::default())
    }

    /// Open or create the RocksDB database and ensure the catalog CF exists.
    pub fn open(&self) -> Result<Arc<DB>> {
        let path = Path::new(&self.db_path);
        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_write_buffer_size(self.settings.write_buffer_size);
        db_opts.set_max_write_buffer_number(self.settings.max_write_buffers);
        db_opts.set_max_background_jobs(self.settings.max_background_jobs);
        db_opts.increase_parallelism(self.settings.max_background_jobs);
        db_opts.set_max_open_files(self.settings.max_open_files);

        // Block cache is shared by every column family
        let cache = Cache::new_lru_cache(self.settings.block_cache_size);
        db_opts.set_block_based_table_factory(&create_block_options_with_cache(&cache));

        // Keep CFs created by earlier catalogs in the same directory
        let mut existing = match DB::list_cf(&db_opts, path) {
            Ok(cfs) if !cfs.is_empty() => cfs,
            _ => vec!["default".to_string()],
        };
        if !existing.iter().any(|n| n == &self.table_name) {
            existing.push(self.table_name.clone());
        }

        let cf_descriptors: Vec<_> = existing
            .iter()
            .map(|name| {
                let mut cf_opts = Options::default();
                cf_opts.set_write_buffer_size(self.settings.write_buffer_size);
                cf_opts.set_max_write_buffer_number(self.settings.max_write_buffers);
                cf_opts.set_block_based_table_factory(&create_block_options_with_cache(&cache));
                ColumnFamilyDescriptor::new(name, cf_opts)
            })
            .collect();

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;
        log::debug!(
            "Opened RocksDB at {} with {} column families (catalog cf '{}')",
            self.db_path,
            existing.len(),
            self.table_name
        );

        Ok(Arc::new(db))
    }
}

fn create_block_options_with_cache(cache: &Cache) -> BlockBasedOptions {
    let mut block_opts = BlockBasedOptions::default();
    block_opts.set_block_cache(cache);
    // Bloom filter speeds up the point lookups done by put_if_absent
    block_opts.set_bloom_filter(10.0, false);
    block_opts.set_cache_index_and_filter_blocks(true);
    block_opts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rocksdb_impl::RocksDBBackend;
    use crate::storage_trait::{Partition, StorageBackend};
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_catalog_cf() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("db");
        let db = RocksDbInit::with_defaults(path.to_string_lossy(), "people").open().unwrap();
        assert!(db.cf_handle("people").is_some());
    }

    #[test]
    fn test_reopen_keeps_rows() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("db").to_string_lossy().to_string();
        let partition = Partition::new("5_phone555-1");

        {
            let db = RocksDbInit::with_defaults(path.clone(), "people").open().unwrap();
            let backend = RocksDBBackend::new(db, "people");
            backend.put(&partition, b"row", b"payload").unwrap();
        }

        let db = RocksDbInit::with_defaults(path, "people").open().unwrap();
        let backend = RocksDBBackend::new(db, "people");
        assert_eq!(backend.get(&partition, b"row").unwrap(), Some(b"payload".to_vec()));
    }
}
