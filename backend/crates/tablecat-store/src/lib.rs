//! # tablecat-store
//!
//! Partition/row-key store abstraction consumed by the catalog core.
//! This crate isolates every direct storage interaction so that
//! tablecat-core stays free of backend-specific dependencies.
//!
//! ## Architecture
//!
//! ```text
//! tablecat-core (encoder, WAL, fan-out, recovery, query)
//!     ↓
//! tablecat-store (StorageBackend: get/put/put_if_absent/delete/scan)
//!     ↓
//! In-memory map | RocksDB column family | remote table service
//! ```

pub mod key_encoding;
pub mod memory_impl;
#[cfg(feature = "rocksdb")]
pub mod rocksdb_impl;
#[cfg(feature = "rocksdb")]
pub mod rocksdb_init;
pub mod storage_trait;

// Make test_utils available for testing in dependent crates
pub mod test_utils;

pub use memory_impl::InMemoryBackend;
#[cfg(feature = "rocksdb")]
pub use rocksdb_impl::RocksDBBackend;
#[cfg(feature = "rocksdb")]
pub use rocksdb_init::RocksDbInit;
pub use storage_trait::{
    KvIterator, Partition, StorageBackend, StorageBackendAsync, StorageError,
};
