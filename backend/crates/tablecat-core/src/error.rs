use thiserror::Error;

/// Errors raised by catalog operations
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The record lacks one or more fields the schema requires
    #[error("Schema mismatch: record is missing required field(s) {}", .missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },

    /// Query on a field that is not indexed
    #[error("Field not indexed: {0}")]
    UnknownField(String),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Network, throttling or timeout failure from the store
    #[error("Store error: {0}")]
    StoreTransient(String),

    /// The intent could not be persisted; no index row was touched
    #[error("WAL append failed: {0}")]
    WalAppendFailed(String),

    /// Some index rows are missing; the WAL entry stays pending for recovery
    #[error(
        "Partial fan-out for operation {operation_id}: {written}/{total} rows applied ({})",
        .failures.join("; ")
    )]
    PartialFanout {
        operation_id: String,
        written: usize,
        total: usize,
        failures: Vec<String>,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corrupt WAL entry {operation_id}: {reason}")]
    CorruptWalEntry { operation_id: String, reason: String },
}

impl CatalogError {
    /// Whether retrying the same call is safe and may succeed.
    ///
    /// Caller errors (bad record, unknown field) will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CatalogError::StoreTransient(_)
                | CatalogError::WalAppendFailed(_)
                | CatalogError::PartialFanout { .. }
        )
    }
}

/// Result type for catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;

// Convert from tablecat_store::StorageError
impl From<tablecat_store::StorageError> for CatalogError {
    fn from(err: tablecat_store::StorageError) -> Self {
        CatalogError::StoreTransient(err.to_string())
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablecat_store::StorageError;

    #[test]
    fn test_storage_error_is_transient() {
        let err: CatalogError = StorageError::IoError("reset".into()).into();
        assert!(matches!(err, CatalogError::StoreTransient(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_caller_errors_not_retryable() {
        assert!(!CatalogError::UnknownField("age".into()).is_retryable());
        let err = CatalogError::SchemaMismatch {
            missing: vec!["email".into(), "phone".into()],
        };
        assert!(!err.is_retryable());
        assert_eq!(
            err.to_string(),
            "Schema mismatch: record is missing required field(s) email, phone"
        );
    }

    #[test]
    fn test_partial_fanout_display() {
        let err = CatalogError::PartialFanout {
            operation_id: "op1".into(),
            written: 2,
            total: 3,
            failures: vec!["5_phone1: I/O error: down".into()],
        };
        assert_eq!(
            err.to_string(),
            "Partial fan-out for operation op1: 2/3 rows applied (5_phone1: I/O error: down)"
        );
    }
}
