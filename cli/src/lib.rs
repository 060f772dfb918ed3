//! tablecat command-line client
//!
//! Opens a RocksDB-backed catalog from a TOML config (or `TABLECAT_*`
//! environment variables) and runs one insert/query/delete/recover command.

pub mod args;
pub mod commands;
pub mod logging;
