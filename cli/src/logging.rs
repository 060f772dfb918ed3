// Logging module, powered by tracing-subscriber
//
// The library crates log through the `log` facade; `tracing_log::LogTracer`
// routes those records into the subscriber installed here. Console output
// goes to stderr so stdout stays reserved for command results.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::path::Path;

use tablecat_configs::LoggingSettings;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Log format type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Compact text format: timestamp LEVEL target - message
    Compact,
    /// JSON Lines format for structured logging
    Json,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" | "jsonl" => LogFormat::Json,
            _ => LogFormat::Compact,
        }
    }
}

/// Build the `EnvFilter` from the base level, noisy-crate overrides and
/// optional per-target overrides from config.
pub fn build_env_filter(
    level: &str,
    target_levels: &HashMap<String, String>,
) -> anyhow::Result<EnvFilter> {
    let mut directives = vec![level.to_string()];

    // RocksDB and the runtime are chatty at debug
    for (target, lvl) in [("rocksdb", "warn"), ("tokio", "warn"), ("tracing", "warn")] {
        directives.push(format!("{}={}", target, lvl));
    }

    // Sorted so the filter string is stable
    let mut overrides: Vec<_> = target_levels.iter().collect();
    overrides.sort();
    for (target, lvl) in overrides {
        directives.push(format!("{}={}", target, lvl));
    }

    let filter_str = directives.join(",");
    EnvFilter::try_new(&filter_str)
        .map_err(|e| anyhow::anyhow!("Invalid tracing filter '{}': {}", filter_str, e))
}

/// Initialize logging from the `[logging]` config section.
///
/// Installs a console layer (when `log_to_console`), a file layer (when
/// `file_path` is set; compact text or JSON lines) and the `LogTracer`
/// bridge.
pub fn init_logging(settings: &LoggingSettings) -> anyhow::Result<()> {
    let log_format = LogFormat::parse(&settings.format);

    // Bridge `log` crate -> tracing; ok() in case already initialized
    tracing_log::LogTracer::init().ok();

    let console_layer = if settings.log_to_console {
        let layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(true);
        let layer = if log_format == LogFormat::Json {
            layer.json().boxed()
        } else {
            layer.with_ansi(true).boxed()
        };
        Some(layer.with_filter(build_env_filter(&settings.level, &settings.targets)?))
    } else {
        None
    };

    let file_layer = match &settings.file_path {
        Some(file_path) => {
            if let Some(parent) = Path::new(file_path).parent() {
                fs::create_dir_all(parent)?;
            }
            let log_file = OpenOptions::new().create(true).append(true).open(file_path)?;

            let layer = if log_format == LogFormat::Json {
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(log_file)
                    .with_target(true)
                    .with_thread_names(true)
                    .boxed()
            } else {
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(log_file)
                    .with_target(true)
                    .with_thread_names(true)
                    .boxed()
            };
            Some(layer.with_filter(build_env_filter(&settings.level, &settings.targets)?))
        },
        None => None,
    };

    // set_global_default rather than init(): the LogTracer bridge is already installed
    let subscriber = tracing_subscriber::registry().with(console_layer).with(file_layer);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {}", e))?;

    tracing::trace!(
        "Logging initialized: level={}, console={}, file={:?}",
        settings.level,
        settings.log_to_console,
        settings.file_path
    );

    Ok(())
}
