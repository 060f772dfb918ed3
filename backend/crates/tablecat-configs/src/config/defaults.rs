// Default value functions
pub fn default_true() -> bool {
    true
}

pub fn default_table_name() -> String {
    "catalog".to_string()
}

pub fn default_data_path() -> String {
    "./data".to_string()
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_log_format() -> String {
    "compact".to_string()
}

pub fn default_recovery_grace_period_ms() -> u64 {
    30_000 // 30 seconds
}

pub fn default_recovery_opportunistic_limit() -> usize {
    100
}

pub fn default_recovery_min_interval_ms() -> u64 {
    1_000
}

pub fn default_fanout_max_concurrency() -> usize {
    8
}

pub fn default_fanout_write_timeout_ms() -> u64 {
    5_000
}

// RocksDB defaults
pub fn default_rocksdb_write_buffer_size() -> usize {
    8 * 1024 * 1024 // 8MB
}

pub fn default_rocksdb_max_write_buffers() -> i32 {
    2
}

pub fn default_rocksdb_block_cache_size() -> usize {
    4 * 1024 * 1024 // 4MB
}

pub fn default_rocksdb_max_background_jobs() -> i32 {
    4
}

pub fn default_rocksdb_max_open_files() -> i32 {
    512
}
