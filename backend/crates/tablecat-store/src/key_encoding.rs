//! Composite key encoding for single-keyspace backends.
//!
//! Backends without a native partition concept (a RocksDB column family, a
//! flat KV map) store a catalog row under one physical key:
//!
//! ```text
//! [len(partition) as u32 BE][partition bytes][row key bytes]
//! ```
//!
//! The length prefix keeps partitions from bleeding into each other when one
//! partition name is a prefix of another, and every row of a partition shares
//! the `[len][partition]` prefix, so a partition scan is a bounded prefix scan.

const LEN_BYTES: usize = 4;

/// Prefix shared by every physical key of `partition`.
pub fn partition_prefix(partition: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(LEN_BYTES + partition.len());
    out.extend_from_slice(&(partition.len() as u32).to_be_bytes());
    out.extend_from_slice(partition.as_bytes());
    out
}

/// Encode `(partition, row_key)` into a single physical key.
///
/// # Examples
///
/// ```
/// use tablecat_store::key_encoding::{composite_key, partition_prefix};
///
/// let key = composite_key("5_phone555-1", b"2026_ab12cd34");
/// assert!(key.starts_with(&partition_prefix("5_phone555-1")));
/// assert!(key.ends_with(b"2026_ab12cd34"));
/// ```
pub fn composite_key(partition: &str, row_key: &[u8]) -> Vec<u8> {
    let mut out = partition_prefix(partition);
    out.extend_from_slice(row_key);
    out
}

/// Smallest key strictly greater than every key starting with `prefix`.
///
/// Returns `None` when no such key exists (prefix of all `0xFF`).
pub fn prefix_upper_bound(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut bound = prefix.to_vec();
    while let Some(last) = bound.pop() {
        if last < u8::MAX {
            bound.push(last + 1);
            return Some(bound);
        }
    }
    None
}
