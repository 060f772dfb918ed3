use super::types::CatalogConfig;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

const VALID_LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];
const VALID_LOG_FORMATS: [&str; 3] = ["compact", "pretty", "json"];

impl CatalogConfig {
    /// Load configuration from a TOML file, apply `TABLECAT_*` environment
    /// overrides, then validate.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        let mut config = Self::from_toml_str(&content)?;
        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from TOML text without applying overrides.
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).map_err(|e| anyhow::anyhow!("Failed to parse config file: {}", e))
    }

    /// Build configuration from defaults plus environment variables only.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = CatalogConfig::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Override settings from `TABLECAT_*` environment variables.
    pub fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Override settings using `lookup` as the variable source.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup("TABLECAT_TABLE_NAME") {
            self.catalog.table_name = name;
        }

        // Comma-separated, e.g. "email,phone,name"
        if let Some(keys) = lookup("TABLECAT_INDEX_KEYS") {
            self.catalog.index_keys = keys
                .split(',')
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect();
        }

        if let Some(row_key) = lookup("TABLECAT_ROW_KEY") {
            self.catalog.row_key = row_key;
        }

        if let Some(val) = lookup("TABLECAT_FOLD_CASE") {
            self.catalog.fold_case = parse_bool(&val);
        }

        if let Some(path) = lookup("TABLECAT_DATA_DIR") {
            self.storage.data_path = path;
        }

        if let Some(level) = lookup("TABLECAT_LOG_LEVEL") {
            self.logging.level = level.to_lowercase();
        }

        if let Some(path) = lookup("TABLECAT_LOG_FILE") {
            self.logging.file_path = Some(path);
        }

        if let Some(val) = lookup("TABLECAT_LOG_TO_CONSOLE") {
            self.logging.log_to_console = parse_bool(&val);
        }

        if let Some(ms) = lookup("TABLECAT_RECOVERY_GRACE_MS") {
            self.recovery.grace_period_ms = ms
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid TABLECAT_RECOVERY_GRACE_MS value: {}", ms))?;
        }

        Ok(())
    }

    /// Validate configuration settings
    pub fn validate(&self) -> anyhow::Result<()> {
        let catalog = &self.catalog;

        if catalog.table_name.trim().is_empty() {
            return Err(anyhow::anyhow!("table_name cannot be empty"));
        }

        if catalog.index_keys.is_empty() {
            return Err(anyhow::anyhow!("index_keys must name at least one field"));
        }

        let mut seen = HashSet::new();
        for key in &catalog.index_keys {
            if key.is_empty() {
                return Err(anyhow::anyhow!("index_keys cannot contain an empty field name"));
            }
            if !seen.insert(key.as_str()) {
                return Err(anyhow::anyhow!("index_keys contains duplicate field '{}'", key));
            }
        }

        if catalog.row_key.is_empty() {
            return Err(anyhow::anyhow!("row_key cannot be empty"));
        }

        if !catalog.index_keys.contains(&catalog.row_key) {
            // Allowed, but every record then has to carry one more field
            log::warn!(
                "row_key '{}' is not one of the index_keys; records must still provide it",
                catalog.row_key
            );
        }

        if self.fanout.max_concurrency == 0 {
            return Err(anyhow::anyhow!("fanout.max_concurrency cannot be 0"));
        }

        if self.fanout.write_timeout_ms == 0 {
            return Err(anyhow::anyhow!("fanout.write_timeout_ms cannot be 0"));
        }

        if self.recovery.opportunistic_limit == 0 {
            return Err(anyhow::anyhow!("recovery.opportunistic_limit cannot be 0"));
        }

        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                VALID_LOG_LEVELS.join(", ")
            ));
        }

        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                VALID_LOG_FORMATS.join(", ")
            ));
        }

        for (target, level) in &self.logging.targets {
            if !VALID_LOG_LEVELS.contains(&level.as_str()) {
                return Err(anyhow::anyhow!(
                    "Invalid log level '{}' for target '{}'. Must be one of: {}",
                    level,
                    target,
                    VALID_LOG_LEVELS.join(", ")
                ));
            }
        }

        Ok(())
    }
}

fn parse_bool(val: &str) -> bool {
    let val = val.to_lowercase();
    val == "true" || val == "1" || val == "yes"
}
