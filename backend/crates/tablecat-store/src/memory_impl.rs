//! In-memory implementation of the StorageBackend trait.
//!
//! Every partition is an ordered `BTreeMap`, so scans come back in row-key
//! order just like a real partitioned store. Used by tests and by callers that
//! want a throwaway catalog.

use crate::storage_trait::{key_in_range, KvIterator, Partition, Result, StorageBackend};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

type Rows = BTreeMap<Vec<u8>, Vec<u8>>;

/// Thread-safe in-memory partition/row store.
#[derive(Default)]
pub struct InMemoryBackend {
    partitions: RwLock<HashMap<Partition, Rows>>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently stored in `partition`.
    pub fn row_count(&self, partition: &Partition) -> usize {
        self.partitions.read().get(partition).map_or(0, BTreeMap::len)
    }

    /// Names of all partitions that currently hold at least one row.
    pub fn partition_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .partitions
            .read()
            .iter()
            .filter(|(_, rows)| !rows.is_empty())
            .map(|(partition, _)| partition.name().to_string())
            .collect();
        names.sort();
        names
    }
}

impl StorageBackend for InMemoryBackend {
    fn get(&self, partition: &Partition, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.partitions.read().get(partition).and_then(|rows| rows.get(key).cloned()))
    }

    fn put(&self, partition: &Partition, key: &[u8], value: &[u8]) -> Result<()> {
        self.partitions
            .write()
            .entry(partition.clone())
            .or_default()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn put_if_absent(&self, partition: &Partition, key: &[u8], value: &[u8]) -> Result<bool> {
        let mut partitions = self.partitions.write();
        let rows = partitions.entry(partition.clone()).or_default();
        if rows.contains_key(key) {
            return Ok(false);
        }
        rows.insert(key.to_vec(), value.to_vec());
        Ok(true)
    }

    fn delete(&self, partition: &Partition, key: &[u8]) -> Result<()> {
        let mut partitions = self.partitions.write();
        if let Some(rows) = partitions.get_mut(partition) {
            rows.remove(key);
            if rows.is_empty() {
                partitions.remove(partition);
            }
        }
        Ok(())
    }

    fn scan(
        &self,
        partition: &Partition,
        start_key: Option<&[u8]>,
        end_key: Option<&[u8]>,
        limit: Option<usize>,
    ) -> Result<KvIterator<'_>> {
        // Snapshot the matching rows so the read lock is not held by the iterator
        let partitions = self.partitions.read();
        let rows: Vec<(Vec<u8>, Vec<u8>)> = match partitions.get(partition) {
            Some(rows) => rows
                .iter()
                .filter(|(k, _)| key_in_range(k, start_key, end_key))
                .take(limit.unwrap_or(usize::MAX))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            None => Vec::new(),
        };
        Ok(Box::new(rows.into_iter()))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
