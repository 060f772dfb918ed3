//! Index lookups: one partition scan per (field, value).

use crate::encoding::Encoder;
use crate::error::{CatalogError, Result};
use crate::record::{FieldValue, Record};
use std::collections::HashSet;
use std::sync::Arc;
use tablecat_store::{StorageBackend, StorageBackendAsync};

/// Half-open `[start, end)` bound on row keys.
///
/// Row keys begin with the row-key field's value, so this is a range over
/// that field. It only matches semantic order when the field sorts
/// lexicographically (ISO-8601 timestamps, zero-padded numbers).
///
/// Bounds are compared against the whole stored key `{value}_{fingerprint}`,
/// not the bare value. When a stored value is a strict prefix of a bound the
/// separator decides: `_` (0x5F) sorts above digits, `-`, `:` and uppercase
/// letters, so `2026-01-01` falls outside `until("2026-01-01T00")` and inside
/// `from("2026-01-01T00")`. Use bounds of the same width as the stored values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowKeyRange {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl RowKeyRange {
    pub fn between(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: Some(start.into()),
            end: Some(end.into()),
        }
    }

    pub fn from(start: impl Into<String>) -> Self {
        Self {
            start: Some(start.into()),
            end: None,
        }
    }

    pub fn until(end: impl Into<String>) -> Self {
        Self {
            start: None,
            end: Some(end.into()),
        }
    }
}

pub struct QueryEngine {
    encoder: Encoder,
    backend: Arc<dyn StorageBackend>,
}

impl QueryEngine {
    pub fn new(encoder: Encoder, backend: Arc<dyn StorageBackend>) -> Self {
        Self { encoder, backend }
    }

    /// Records whose `field` equals `value`, in row-key order.
    pub async fn query(
        &self,
        field: &str,
        value: &FieldValue,
        range: Option<&RowKeyRange>,
    ) -> Result<Vec<Record>> {
        Ok(self.scan_rows(field, value, range).await?.into_iter().map(|(_, r)| r).collect())
    }

    /// Records matching every `(field, value)` filter.
    ///
    /// All fields are checked before any partition is scanned. The first
    /// filter's partition drives the scan; the rest narrow it by row key.
    pub async fn query_where(
        &self,
        filters: &[(String, FieldValue)],
        range: Option<&RowKeyRange>,
    ) -> Result<Vec<Record>> {
        let Some(((first_field, first_value), rest)) = filters.split_first() else {
            return Err(CatalogError::InvalidQuery("at least one filter is required".to_string()));
        };
        for (field, value) in filters {
            self.encoder.partition_for(field, value)?;
        }

        let mut rows = self.scan_rows(first_field, first_value, range).await?;
        for (field, value) in rest {
            if rows.is_empty() {
                break;
            }
            let keys: HashSet<String> = self
                .scan_rows(field, value, range)
                .await?
                .into_iter()
                .map(|(key, _)| key)
                .collect();
            rows.retain(|(key, _)| keys.contains(key));
        }

        Ok(rows.into_iter().map(|(_, r)| r).collect())
    }

    /// `(row_key, record)` pairs of one index partition.
    pub(crate) async fn scan_rows(
        &self,
        field: &str,
        value: &FieldValue,
        range: Option<&RowKeyRange>,
    ) -> Result<Vec<(String, Record)>> {
        let partition = self.encoder.partition_for(field, value)?;
        let (start, end) = match range {
            Some(r) => (
                r.start.as_ref().map(|s| s.as_bytes().to_vec()),
                r.end.as_ref().map(|s| s.as_bytes().to_vec()),
            ),
            None => (None, None),
        };

        let rows = self.backend.scan_async(&partition, start, end, None).await?;
        log::debug!("Scanned {} rows from partition {}", rows.len(), partition);

        rows.into_iter()
            .map(|(key, payload)| {
                let record = Record::from_json_bytes(&payload).map_err(|e| {
                    CatalogError::Serialization(format!(
                        "row {} in {}: {}",
                        String::from_utf8_lossy(&key),
                        partition,
                        e
                    ))
                })?;
                Ok((String::from_utf8_lossy(&key).into_owned(), record))
            })
            .collect()
    }
}
