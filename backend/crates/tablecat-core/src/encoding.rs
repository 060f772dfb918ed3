//! Record to index-row encoding.
//!
//! A record with `k` index fields becomes `k` physical rows, one per field:
//!
//! ```text
//! partition  "{len(field)}_{field}{value}"      e.g. "5_phone555-1"
//! row key    "{row_key_value}_{fingerprint}"    e.g. "2026-01-01T00:00:00Z_3fa1c29e"
//! payload    full record as JSON
//! ```
//!
//! The character-length prefix makes the field/value boundary unambiguous,
//! so `("ab", "c")` and `("a", "bc")` never share a partition. Index
//! partitions always start with a digit; the WAL partition (`~wal`) does not.
//!
//! Everything here is pure: identical inputs give identical keys.

use crate::error::{CatalogError, Result};
use crate::record::{FieldValue, Record};
use crate::schema::Schema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tablecat_store::Partition;

const FINGERPRINT_TAG: &[u8] = b"tablecat:fp:v1";

/// Width of the fingerprint suffix in hex characters.
pub const FINGERPRINT_HEX_LEN: usize = 8;

/// Identity of an encoded record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKey {
    pub row_key_value: String,
    pub fingerprint: String,
    pub row_key: String,
}

/// One physical row a record fans out to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRowTarget {
    pub field: String,
    pub partition_key: String,
    pub row_key: String,
    /// Serialized record (JSON)
    pub payload: String,
}

impl IndexRowTarget {
    pub fn partition(&self) -> Partition {
        Partition::new(self.partition_key.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRecord {
    pub primary: PrimaryKey,
    /// One target per index field, in schema order
    pub targets: Vec<IndexRowTarget>,
}

/// Partition key for `field` holding the canonical value text `value`.
pub fn partition_key(field: &str, value: &str) -> String {
    format!("{}_{}{}", field.chars().count(), field, value)
}

/// Row key for a record: row-key field value plus fingerprint suffix.
pub fn row_key(row_key_value: &str, fingerprint: &str) -> String {
    format!("{}_{}", row_key_value, fingerprint)
}

/// Fingerprint over `(field, value)` pairs, independent of their order.
///
/// SHA-256 over a version tag and the length-framed pairs sorted by field
/// name; the first four digest bytes as lowercase hex.
pub fn fingerprint<'a, I>(pairs: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut pairs: Vec<(&str, &str)> = pairs.into_iter().collect();
    pairs.sort_unstable();

    let mut hasher = Sha256::new();
    hasher.update(FINGERPRINT_TAG);
    for (name, value) in pairs {
        write_str(&mut hasher, name);
        write_str(&mut hasher, value);
    }
    let digest = hasher.finalize();
    hex::encode(&digest[..FINGERPRINT_HEX_LEN / 2])
}

fn write_str(hasher: &mut Sha256, s: &str) {
    hasher.update((s.len() as u32).to_be_bytes());
    hasher.update(s.as_bytes());
}

/// Schema-bound encoder shared by the writer, recovery and query paths.
#[derive(Debug, Clone)]
pub struct Encoder {
    schema: Arc<Schema>,
    fold_case: bool,
}

impl Encoder {
    pub fn new(schema: Arc<Schema>, fold_case: bool) -> Self {
        Self { schema, fold_case }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn fold_case(&self) -> bool {
        self.fold_case
    }

    /// Value text as it appears in partition keys and fingerprint input.
    fn index_text(&self, value: &FieldValue) -> String {
        let text = value.key_text();
        if self.fold_case {
            text.to_lowercase()
        } else {
            text
        }
    }

    /// Partition holding the rows whose `field` equals `value`.
    ///
    /// Fails with `UnknownField` when `field` is not indexed.
    pub fn partition_for(&self, field: &str, value: &FieldValue) -> Result<Partition> {
        if !self.schema.is_indexed(field) {
            return Err(CatalogError::UnknownField(field.to_string()));
        }
        Ok(Partition::new(partition_key(field, &self.index_text(value))))
    }

    /// Map `record` to its primary key and one target row per index field.
    pub fn encode(&self, record: &Record) -> Result<EncodedRecord> {
        let missing: Vec<String> = self
            .schema
            .required_fields()
            .filter(|f| record.value_of(f).is_none())
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(CatalogError::SchemaMismatch { missing });
        }

        let index_values: Vec<(&str, String)> = self
            .schema
            .index_fields()
            .iter()
            .filter_map(|f| record.value_of(f).map(|v| (f.as_str(), self.index_text(v))))
            .collect();

        let fingerprint = fingerprint(index_values.iter().map(|(f, v)| (*f, v.as_str())));
        let row_key_value = record
            .value_of(self.schema.row_key_field())
            .map(FieldValue::key_text)
            .unwrap_or_default();
        let row_key = row_key(&row_key_value, &fingerprint);
        let payload = record.to_json()?;

        let targets = index_values
            .iter()
            .map(|(field, value)| IndexRowTarget {
                field: field.to_string(),
                partition_key: partition_key(field, value),
                row_key: row_key.clone(),
                payload: payload.clone(),
            })
            .collect();

        Ok(EncodedRecord {
            primary: PrimaryKey {
                row_key_value,
                fingerprint,
                row_key,
            },
            targets,
        })
    }
}
