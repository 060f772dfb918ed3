use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// tablecat - multi-field indexed catalog over RocksDB
#[derive(Parser, Debug)]
#[command(name = "tablecat")]
#[command(version)]
#[command(about = "Insert, look up and repair records of a tablecat catalog", long_about = None)]
pub struct Cli {
    /// Catalog config file (TOML); TABLECAT_* environment variables otherwise
    #[arg(short = 'c', long = "config", env = "TABLECAT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override storage.data_path
    #[arg(long = "data-dir")]
    pub data_dir: Option<String>,

    /// Override logging.level
    #[arg(long = "log-level")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Insert (upsert) one record given as a JSON object
    Insert {
        #[arg(long = "record")]
        record: String,
    },

    /// Look up records; several filters must all match
    Query {
        /// field=value (repeatable)
        #[arg(long = "filter", required = true, value_parser = parse_filter)]
        filters: Vec<(String, String)>,

        /// First row-key value to include
        #[arg(long = "from")]
        from: Option<String>,

        /// Row-key value to stop before
        #[arg(long = "to")]
        to: Option<String>,
    },

    /// Delete every record matching field=value
    Delete {
        #[arg(long = "filter", value_parser = parse_filter)]
        filter: (String, String),

        #[arg(long = "from")]
        from: Option<String>,

        #[arg(long = "to")]
        to: Option<String>,
    },

    /// Replay unfinished writes left in the WAL
    Recover {
        /// Ignore the grace period and replay every pending entry
        #[arg(long = "all")]
        all: bool,

        /// Keep running the background loop at recovery.background_interval_secs until Ctrl-C
        #[arg(long = "watch")]
        watch: bool,
    },
}

/// Parse `field=value`; the value may itself contain `=`.
pub fn parse_filter(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((field, value)) if !field.is_empty() => Ok((field.to_string(), value.to_string())),
        _ => Err(format!("expected field=value, got '{}'", s)),
    }
}
