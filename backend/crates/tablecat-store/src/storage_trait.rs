//! Storage backend abstraction for the catalog's partition/row-key store.
//!
//! The catalog only assumes what a partitioned key-value service (Azure Table
//! Storage, DynamoDB, a RocksDB column family, ...) offers natively:
//!
//! - get/put/delete of a single row addressed by `(partition, row_key)`
//! - a conditional create of a single row (`put_if_absent`)
//! - an ordered range scan over the rows of one partition
//!
//! There is deliberately no cross-partition batch. Every operation touches one
//! row of one partition, and that single-row write is the only atomicity the
//! write-ahead log relies on.
//!
//! ## Partition Model
//!
//! A `Partition` is the store's first addressing component. Rows that share a
//! partition are scanned together in lexicographic row-key order:
//!
//! ```text
//! partition "5_phone555-1"   row "2026-01-01T00:00:00Z_3fa1c29e" -> {record json}
//! partition "5_emaila@x"     row "2026-01-01T00:00:00Z_3fa1c29e" -> {record json}
//! partition "~wal"           row "2026-01-01T00:00:00.000000Z_<uuid>" -> {wal entry}
//! partition "~fp"            row "3fa1c29e" -> {identity pointer}
//! ```
//!
//! ## Implementing a Custom Backend
//!
//! ```rust,ignore
//! use tablecat_store::storage_trait::{KvIterator, Partition, Result, StorageBackend};
//!
//! pub struct MyBackend { /* client handle */ }
//!
//! impl StorageBackend for MyBackend {
//!     fn get(&self, partition: &Partition, key: &[u8]) -> Result<Option<Vec<u8>>> {
//!         todo!()
//!     }
//!     // ... implement other required methods
//! }
//! ```

use std::fmt;
use std::sync::Arc;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Ordered `(row_key, payload)` pairs produced by a partition scan.
pub type KvIterator<'a> = Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a>;

/// Errors that can occur during storage operations.
#[derive(Debug, Clone)]
pub enum StorageError {
    /// Partition (column family, table, namespace) not found
    PartitionNotFound(String),

    /// Generic I/O or network error from underlying storage
    IoError(String),

    /// The store did not answer within the configured deadline
    Timeout(String),

    /// Other errors
    Other(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::PartitionNotFound(p) => write!(f, "Partition not found: {}", p),
            StorageError::IoError(msg) => write!(f, "I/O error: {}", msg),
            StorageError::Timeout(msg) => write!(f, "Timed out: {}", msg),
            StorageError::Other(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {}

/// Represents a logical partition of data within a storage backend.
///
/// For the catalog this is the store's partition key: one per (index field,
/// value) pair, plus the reserved WAL and identity partitions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Partition {
    name: String,
}

impl Partition {
    /// Creates a new partition with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Returns the partition name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl From<String> for Partition {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl From<&str> for Partition {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Trait for pluggable storage backend implementations.
///
/// Implementations must be thread-safe (Send + Sync) to allow concurrent access.
///
/// ## Error Handling
///
/// Implementations should:
/// - Return `IoError` for underlying storage or network failures
/// - Return `Timeout` when a remote call exceeded its deadline
/// - Return `PartitionNotFound` when the backing namespace itself is missing
///
/// A missing partition is never an error for reads: `get` answers `None` and
/// `scan` yields nothing.
pub trait StorageBackend: Send + Sync {
    /// Retrieves a value by row key from the specified partition.
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    fn get(&self, partition: &Partition, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Stores a row in the specified partition.
    ///
    /// If the key already exists, its value is replaced.
    fn put(&self, partition: &Partition, key: &[u8], value: &[u8]) -> Result<()>;

    /// Stores a row only if no row with this key exists yet.
    ///
    /// Returns `Ok(false)` without writing when the row is already present.
    fn put_if_absent(&self, partition: &Partition, key: &[u8], value: &[u8]) -> Result<bool>;

    /// Deletes a row from the specified partition.
    ///
    /// Returns `Ok(())` even if the key doesn't exist (idempotent).
    fn delete(&self, partition: &Partition, key: &[u8]) -> Result<()>;

    /// Scans the rows of one partition in ascending row-key order.
    ///
    /// ## Parameters
    /// - `start_key`: If Some, first row key to return (inclusive)
    /// - `end_key`: If Some, stop before this row key (exclusive)
    /// - `limit`: If Some, return at most this many entries
    fn scan(
        &self,
        partition: &Partition,
        start_key: Option<&[u8]>,
        end_key: Option<&[u8]>,
        limit: Option<usize>,
    ) -> Result<KvIterator<'_>>;

    /// Short backend identifier used in log lines.
    fn backend_name(&self) -> &'static str;
}

/// Returns true when `key` falls inside the half-open `[start, end)` range.
pub fn key_in_range(key: &[u8], start_key: Option<&[u8]>, end_key: Option<&[u8]>) -> bool {
    if let Some(start) = start_key {
        if key < start {
            return false;
        }
    }
    if let Some(end) = end_key {
        if key >= end {
            return false;
        }
    }
    true
}

/// Extension trait providing async versions of StorageBackend methods.
///
/// These methods internally use `tokio::task::spawn_blocking` to offload
/// synchronous storage operations to a blocking thread pool, preventing
/// the async runtime from being blocked.
///
/// ## Usage
///
/// ```rust,ignore
/// use tablecat_store::storage_trait::{StorageBackend, StorageBackendAsync, Partition};
/// use std::sync::Arc;
///
/// async fn store_row(backend: Arc<dyn StorageBackend>, partition: &Partition) {
///     backend.put_async(partition, b"row", b"payload").await.unwrap();
///     let value = backend.get_async(partition, b"row").await.unwrap();
/// }
/// ```
#[async_trait::async_trait]
pub trait StorageBackendAsync: Send + Sync {
    /// Async version of `get()` - retrieves a value by key.
    async fn get_async(&self, partition: &Partition, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Async version of `put()` - stores a row.
    async fn put_async(&self, partition: &Partition, key: &[u8], value: &[u8]) -> Result<()>;

    /// Async version of `put_if_absent()` - conditionally creates a row.
    async fn put_if_absent_async(
        &self,
        partition: &Partition,
        key: &[u8],
        value: &[u8],
    ) -> Result<bool>;

    /// Async version of `delete()` - removes a row.
    async fn delete_async(&self, partition: &Partition, key: &[u8]) -> Result<()>;

    /// Async version of `scan()` - scans one partition.
    /// Returns collected results since iterators can't cross spawn_blocking boundary.
    async fn scan_async(
        &self,
        partition: &Partition,
        start_key: Option<Vec<u8>>,
        end_key: Option<Vec<u8>>,
        limit: Option<usize>,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;
}

// Blanket implementation for Arc<dyn StorageBackend>
#[async_trait::async_trait]
impl StorageBackendAsync for Arc<dyn StorageBackend> {
    async fn get_async(&self, partition: &Partition, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let backend = self.clone();
        let partition = partition.clone();
        let key = key.to_vec();
        tokio::task::spawn_blocking(move || backend.get(&partition, &key))
            .await
            .map_err(|e| StorageError::Other(format!("spawn_blocking join error: {}", e)))?
    }

    async fn put_async(&self, partition: &Partition, key: &[u8], value: &[u8]) -> Result<()> {
        let backend = self.clone();
        let partition = partition.clone();
        let key = key.to_vec();
        let value = value.to_vec();
        tokio::task::spawn_blocking(move || backend.put(&partition, &key, &value))
            .await
            .map_err(|e| StorageError::Other(format!("spawn_blocking join error: {}", e)))?
    }

    async fn put_if_absent_async(
        &self,
        partition: &Partition,
        key: &[u8],
        value: &[u8],
    ) -> Result<bool> {
        let backend = self.clone();
        let partition = partition.clone();
        let key = key.to_vec();
        let value = value.to_vec();
        tokio::task::spawn_blocking(move || backend.put_if_absent(&partition, &key, &value))
            .await
            .map_err(|e| StorageError::Other(format!("spawn_blocking join error: {}", e)))?
    }

    async fn delete_async(&self, partition: &Partition, key: &[u8]) -> Result<()> {
        let backend = self.clone();
        let partition = partition.clone();
        let key = key.to_vec();
        tokio::task::spawn_blocking(move || backend.delete(&partition, &key))
            .await
            .map_err(|e| StorageError::Other(format!("spawn_blocking join error: {}", e)))?
    }

    async fn scan_async(
        &self,
        partition: &Partition,
        start_key: Option<Vec<u8>>,
        end_key: Option<Vec<u8>>,
        limit: Option<usize>,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let backend = self.clone();
        let partition = partition.clone();
        tokio::task::spawn_blocking(move || {
            let iter =
                backend.scan(&partition, start_key.as_deref(), end_key.as_deref(), limit)?;
            Ok(iter.collect())
        })
        .await
        .map_err(|e| StorageError::Other(format!("spawn_blocking join error: {}", e)))?
    }
}
