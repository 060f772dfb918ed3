//! RocksDB implementation of the StorageBackend trait.
//!
//! One column family holds one catalog table. Catalog partitions are not
//! column families (there is one per indexed value), they are key prefixes
//! produced by [`crate::key_encoding`].

use crate::key_encoding::{composite_key, partition_prefix, prefix_upper_bound};
use crate::storage_trait::{KvIterator, Partition, Result, StorageBackend, StorageError};
use parking_lot::Mutex;
use rocksdb::{ColumnFamily, Direction, IteratorMode, DB};
use std::sync::Arc;

/// RocksDB implementation of the StorageBackend trait.
///
/// ## Example
///
/// ```rust,ignore
/// use tablecat_store::{RocksDBBackend, RocksDbInit, StorageBackend, Partition};
///
/// let db = RocksDbInit::with_defaults("/tmp/catalog", "catalog").open()?;
/// let backend = RocksDBBackend::new(db, "catalog");
///
/// let partition = Partition::new("5_phone555-1");
/// backend.put(&partition, b"row1", b"value1")?;
/// assert_eq!(backend.get(&partition, b"row1")?, Some(b"value1".to_vec()));
/// ```
pub struct RocksDBBackend {
    db: Arc<DB>,
    cf_name: String,
    // RocksDB has no compare-and-set; conditional creates are serialized in-process
    create_lock: Mutex<()>,
}

impl RocksDBBackend {
    /// Creates a backend over the column family `cf_name` of `db`.
    pub fn new(db: Arc<DB>, cf_name: impl Into<String>) -> Self {
        Self {
            db,
            cf_name: cf_name.into(),
            create_lock: Mutex::new(()),
        }
    }

    /// Returns a reference to the underlying database.
    pub fn db(&self) -> &Arc<DB> {
        &self.db
    }

    fn cf(&self) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(&self.cf_name)
            .ok_or_else(|| StorageError::PartitionNotFound(self.cf_name.clone()))
    }
}

impl StorageBackend for RocksDBBackend {
    fn get(&self, partition: &Partition, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let cf = self.cf()?;
        self.db
            .get_cf(cf, composite_key(partition.name(), key))
            .map_err(|e| StorageError::IoError(e.to_string()))
    }

    fn put(&self, partition: &Partition, key: &[u8], value: &[u8]) -> Result<()> {
        let cf = self.cf()?;
        self.db
            .put_cf(cf, composite_key(partition.name(), key), value)
            .map_err(|e| StorageError::IoError(e.to_string()))
    }

    fn put_if_absent(&self, partition: &Partition, key: &[u8], value: &[u8]) -> Result<bool> {
        let cf = self.cf()?;
        let physical = composite_key(partition.name(), key);

        let _guard = self.create_lock.lock();
        let existing = self
            .db
            .get_pinned_cf(cf, &physical)
            .map_err(|e| StorageError::IoError(e.to_string()))?;
        if existing.is_some() {
            return Ok(false);
        }
        self.db
            .put_cf(cf, &physical, value)
            .map_err(|e| StorageError::IoError(e.to_string()))?;
        Ok(true)
    }

    fn delete(&self, partition: &Partition, key: &[u8]) -> Result<()> {
        let cf = self.cf()?;
        self.db
            .delete_cf(cf, composite_key(partition.name(), key))
            .map_err(|e| StorageError::IoError(e.to_string()))
    }

    fn scan(
        &self,
        partition: &Partition,
        start_key: Option<&[u8]>,
        end_key: Option<&[u8]>,
        limit: Option<usize>,
    ) -> Result<KvIterator<'_>> {
        let cf = self.cf()?;

        let prefix = partition_prefix(partition.name());
        let lower = match start_key {
            Some(start) => composite_key(partition.name(), start),
            None => prefix.clone(),
        };
        let upper = match end_key {
            Some(end) => Some(composite_key(partition.name(), end)),
            None => prefix_upper_bound(&prefix),
        };

        let mut readopts = rocksdb::ReadOptions::default();
        if let Some(upper) = upper {
            readopts.set_iterate_upper_bound(upper);
        }
        let inner = self
            .db
            .iterator_cf_opt(cf, readopts, IteratorMode::From(&lower, Direction::Forward));

        let prefix_len = prefix.len();
        let iter = inner
            .map_while(|item| item.ok())
            .take_while(move |(k, _)| k.starts_with(&prefix))
            .map(move |(k, v)| (k[prefix_len..].to_vec(), v.to_vec()))
            .take(limit.unwrap_or(usize::MAX));

        Ok(Box::new(iter))
    }

    fn backend_name(&self) -> &'static str {
        "rocksdb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocksdb::Options;
    use tempfile::TempDir;

    fn create_test_backend() -> (RocksDBBackend, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let db = DB::open_cf(&opts, temp_dir.path(), ["catalog"]).unwrap();
        (RocksDBBackend::new(Arc::new(db), "catalog"), temp_dir)
    }

    #[test]
    fn test_put_and_get() {
        let (backend, _temp) = create_test_backend();
        let partition = Partition::new("5_phone555-1");

        backend.put(&partition, b"key1", b"value1").unwrap();
        let value = backend.get(&partition, b"key1").unwrap();

        assert_eq!(value, Some(b"value1".to_vec()));
        assert_eq!(backend.get(&Partition::new("5_phone555-2"), b"key1").unwrap(), None);
    }

    #[test]
    fn test_delete() {
        let (backend, _temp) = create_test_backend();
        let partition = Partition::new("p");

        backend.put(&partition, b"key1", b"value1").unwrap();
        backend.delete(&partition, b"key1").unwrap();
        backend.delete(&partition, b"key1").unwrap();

        assert_eq!(backend.get(&partition, b"key1").unwrap(), None);
    }

    #[test]
    fn test_put_if_absent() {
        let (backend, _temp) = create_test_backend();
        let partition = Partition::new("~wal");

        assert!(backend.put_if_absent(&partition, b"op", b"a").unwrap());
        assert!(!backend.put_if_absent(&partition, b"op", b"b").unwrap());
        assert_eq!(backend.get(&partition, b"op").unwrap(), Some(b"a".to_vec()));
    }

    #[test]
    fn test_scan_stays_inside_partition() {
        let (backend, _temp) = create_test_backend();
        let short = Partition::new("5_phone5");
        let long = Partition::new("5_phone55");

        backend.put(&short, b"a", b"1").unwrap();
        backend.put(&short, b"b", b"2").unwrap();
        backend.put(&short, b"c", b"3").unwrap();
        backend.put(&long, b"a", b"x").unwrap();

        let all: Vec<_> = backend.scan(&short, None, None, None).unwrap().collect();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0], (b"a".to_vec(), b"1".to_vec()));

        let ranged: Vec<_> = backend
            .scan(&short, Some(b"b"), Some(b"c"), None)
            .unwrap()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(ranged, vec![b"b".to_vec()]);

        let limited = backend.scan(&short, None, None, Some(2)).unwrap().count();
        assert_eq!(limited, 2);
    }
}
