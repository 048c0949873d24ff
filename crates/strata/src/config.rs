//! Registry configuration.
//!
//! ```
//! use strata::config::Config;
//! use strata::dialect::DialectKind;
//!
//! let config = Config::from_toml_str(
//!     r#"
//!     dialect = "sqlite"
//!     table_prefix = "app_"
//!     "#,
//! )?;
//! assert_eq!(config.dialect, DialectKind::Sqlite);
//! assert!(config.cache);
//! # Ok::<(), strata::OrmError>(())
//! ```

use crate::dialect::DialectKind;
use crate::error::{OrmError, OrmResult};
use crate::executor::SqlLog;
use crate::ident::validate_name;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Settings a [`Registry`](crate::registry::Registry) is built from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Rendering target.
    pub dialect: DialectKind,
    /// Prepended to every table's physical name.
    pub table_prefix: String,
    /// Whether models get an in-memory identity map by default.
    pub cache: bool,
    /// Truncate logged SQL to this many bytes.
    pub log_sql_max_len: usize,
    /// Statements slower than this are logged at `WARN`.
    pub slow_statement_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dialect: DialectKind::MySql,
            table_prefix: String::new(),
            cache: true,
            log_sql_max_len: 200,
            slow_statement_ms: 500,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dialect(mut self, dialect: DialectKind) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    /// Enable or disable the default in-memory record cache.
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache = enabled;
        self
    }

    pub fn with_log_sql_max_len(mut self, len: usize) -> Self {
        self.log_sql_max_len = len;
        self
    }

    pub fn with_slow_statement_threshold(mut self, threshold: Duration) -> Self {
        self.slow_statement_ms = u64::try_from(threshold.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(raw: &str) -> OrmResult<Self> {
        let config: Config = toml::from_str(raw)
            .map_err(|e| OrmError::config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> OrmResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            OrmError::config(format!("failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// A prefix must itself be a valid identifier fragment.
    pub fn validate(&self) -> OrmResult<()> {
        if !self.table_prefix.is_empty() {
            validate_name(&self.table_prefix)
                .map_err(|_| OrmError::config(format!("invalid table_prefix '{}'", self.table_prefix)))?;
        }
        Ok(())
    }

    pub(crate) fn sql_log(&self) -> SqlLog {
        SqlLog {
            max_len: self.log_sql_max_len,
            slow: Duration::from_millis(self.slow_statement_ms),
        }
    }
}
