use super::defaults::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Main catalog configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub catalog: CatalogSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub recovery: RecoverySettings,
    #[serde(default)]
    pub fanout: FanoutSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Catalog schema and identity
///
/// The schema is fixed for the lifetime of a catalog: changing `index_keys`
/// or `row_key` without migrating existing rows invalidates their encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSettings {
    /// Catalog/table identifier (RocksDB column family name)
    #[serde(default = "default_table_name")]
    pub table_name: String,
    /// Ordered list of indexed field names
    #[serde(default)]
    pub index_keys: Vec<String>,
    /// Field whose value prefixes every row key (pick a lexicographically ordered one)
    #[serde(default)]
    pub row_key: String,
    /// Lowercase partition keys and fingerprint inputs (case-insensitive lookups)
    #[serde(default)]
    pub fold_case: bool,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            table_name: default_table_name(),
            index_keys: Vec::new(),
            row_key: String::new(),
            fold_case: false,
        }
    }
}

/// Storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Directory holding the RocksDB files
    #[serde(default = "default_data_path")]
    pub data_path: String,
    #[serde(default)]
    pub rocksdb: RocksDbSettings,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            rocksdb: RocksDbSettings::default(),
        }
    }
}

/// RocksDB-specific settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDbSettings {
    /// Write buffer size per column family in bytes (default: 8MB)
    #[serde(default = "default_rocksdb_write_buffer_size")]
    pub write_buffer_size: usize,

    /// Maximum number of write buffers (default: 2)
    #[serde(default = "default_rocksdb_max_write_buffers")]
    pub max_write_buffers: i32,

    /// Block cache size for reads in bytes (default: 4MB, shared across CFs)
    #[serde(default = "default_rocksdb_block_cache_size")]
    pub block_cache_size: usize,

    /// Maximum number of background jobs (default: 4)
    #[serde(default = "default_rocksdb_max_background_jobs")]
    pub max_background_jobs: i32,

    /// Maximum number of open files RocksDB can keep open (default: 512, -1 = unlimited)
    #[serde(default = "default_rocksdb_max_open_files")]
    pub max_open_files: i32,
}

impl Default for RocksDbSettings {
    fn default() -> Self {
        Self {
            write_buffer_size: default_rocksdb_write_buffer_size(),
            max_write_buffers: default_rocksdb_max_write_buffers(),
            block_cache_size: default_rocksdb_block_cache_size(),
            max_background_jobs: default_rocksdb_max_background_jobs(),
            max_open_files: default_rocksdb_max_open_files(),
        }
    }
}

/// Self-healing recovery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoverySettings {
    /// Only replay WAL entries older than this, so an in-flight writer is not raced
    #[serde(default = "default_recovery_grace_period_ms")]
    pub grace_period_ms: u64,
    /// Maximum WAL entries replayed by the pass that runs before each write
    #[serde(default = "default_recovery_opportunistic_limit")]
    pub opportunistic_limit: usize,
    /// Minimum spacing between two opportunistic passes
    #[serde(default = "default_recovery_min_interval_ms")]
    pub min_interval_ms: u64,
    /// Background recovery period in seconds (0 = no background loop)
    #[serde(default)]
    pub background_interval_secs: u64,
}

impl Default for RecoverySettings {
    fn default() -> Self {
        Self {
            grace_period_ms: default_recovery_grace_period_ms(),
            opportunistic_limit: default_recovery_opportunistic_limit(),
            min_interval_ms: default_recovery_min_interval_ms(),
            background_interval_secs: 0,
        }
    }
}

/// Index-row fan-out settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanoutSettings {
    /// Maximum concurrent row writes per fan-out
    #[serde(default = "default_fanout_max_concurrency")]
    pub max_concurrency: usize,
    /// Deadline for a single row write; a timeout counts as a transient failure
    #[serde(default = "default_fanout_write_timeout_ms")]
    pub write_timeout_ms: u64,
}

impl Default for FanoutSettings {
    fn default() -> Self {
        Self {
            max_concurrency: default_fanout_max_concurrency(),
            write_timeout_ms: default_fanout_write_timeout_ms(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Optional log file; console-only when unset
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default = "default_true")]
    pub log_to_console: bool,
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Optional per-target log level overrides
    /// [logging.targets]
    /// tablecat_core = "debug"
    #[serde(default)]
    pub targets: HashMap<String, String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_path: None,
            log_to_console: true,
            format: default_log_format(),
            targets: HashMap::new(),
        }
    }
}
