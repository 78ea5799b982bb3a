use crate::error::{Error, Result};
use crate::melt::{default_naming_rules, NamingRule, DEFAULT_ARRAY_THRESHOLD, DEFAULT_KEY_FIELD};
use crate::schema::DEFAULT_MAX_VARCHAR_LENGTH;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for an export run.
///
/// Every field has a default, so a config file only needs the keys it
/// overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Maximum number of documents read per collection; 0 means no limit
    pub limit: Option<u64>,

    /// Only load data into tables that already exist; never change schemas
    pub data_only: bool,

    /// Destination tables whose rows are discarded
    pub skip_tables: Vec<String>,

    /// Source collections to export (all when empty)
    pub collections: Vec<String>,

    /// Rows with more attributes than this are discarded
    pub max_columns: usize,

    /// Strings longer than this become `text` columns
    pub max_varchar_length: u32,

    /// Integer-keyed mappings with more entries than this are child tables
    pub array_threshold: usize,

    /// Document field holding the natural key used for table naming
    pub key_field: String,

    /// Ordered natural key rewrites
    pub naming_rules: Vec<NamingRule>,

    /// Minimum number of seconds between progress reports
    pub progress_interval_secs: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        ExportConfig {
            limit: None,
            data_only: false,
            skip_tables: vec![],
            collections: vec![],
            max_columns: 500,
            max_varchar_length: DEFAULT_MAX_VARCHAR_LENGTH,
            array_threshold: DEFAULT_ARRAY_THRESHOLD,
            key_field: String::from(DEFAULT_KEY_FIELD),
            naming_rules: default_naming_rules(),
            progress_interval_secs: 5,
        }
    }
}

impl ExportConfig {
    /// Load a JSON config file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config: ExportConfig = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("cannot parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_columns == 0 {
            return Err(Error::Config("max_columns must be positive".to_string()));
        }
        if self.max_varchar_length == 0 {
            return Err(Error::Config("max_varchar_length must be positive".to_string()));
        }
        if self.key_field.is_empty() {
            return Err(Error::Config("key_field must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn is_skipped(&self, table: &str) -> bool {
        self.skip_tables.iter().any(|t| t == table)
    }

    pub fn wants_collection(&self, name: &str) -> bool {
        self.collections.is_empty() || self.collections.iter().any(|c| c == name)
    }

    /// The effective per-collection document limit
    pub fn document_limit(&self) -> Option<u64> {
        self.limit.filter(|&n| n > 0)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.progress_interval_secs)
    }
}

/// Split a comma-separated list, dropping blanks
pub fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
