//! Error types for strata

use crate::value::Value;
use thiserror::Error;

/// Result type alias for strata operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error reported by a statement executor (the database driver).
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error types for mapping, rendering and statement execution
#[derive(Debug, Error)]
pub enum OrmError {
    /// Build-time configuration error (missing schema, missing primary key,
    /// undeclared index column, ambiguous relation target, ...)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A relation accessor found an empty, non-nullable local key
    #[error("Relation integrity error: relation '{relation}' requires a value in '{column}'")]
    RelationIntegrity { relation: String, column: String },

    /// The active dialect cannot express a column definition
    #[error("Render error ({dialect}) on column '{column}': {message}")]
    Render {
        dialect: &'static str,
        column: String,
        message: String,
    },

    /// The executor refused to prepare a statement
    #[error("Failed to prepare statement `{sql}`: {source}")]
    Prepare {
        sql: String,
        #[source]
        source: DriverError,
    },

    /// A prepared statement failed while executing
    #[error("Failed to execute statement `{sql}` with {} argument(s): {source}", args.len())]
    Execute {
        sql: String,
        args: Vec<Value>,
        #[source]
        source: DriverError,
    },

    /// An inheritance-chain write stopped part way through
    #[error("Partial write: {table} failed after writing {written:?}: {source}")]
    PartialWrite {
        written: Vec<String>,
        table: String,
        #[source]
        source: Box<OrmError>,
    },

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input (identifiers, templates, values)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Value decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl OrmError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a rendering error for a column
    pub fn render(
        dialect: &'static str,
        column: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Render {
            dialect,
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a relation integrity error
    pub fn relation_integrity(relation: impl Into<String>, column: impl Into<String>) -> Self {
        Self::RelationIntegrity {
            relation: relation.into(),
            column: column.into(),
        }
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Check if this is a configuration error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Check if this is a relation integrity error
    pub fn is_relation_integrity(&self) -> bool {
        matches!(self, Self::RelationIntegrity { .. })
    }

    /// Check if this is a rendering error
    pub fn is_render(&self) -> bool {
        matches!(self, Self::Render { .. })
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is a partial inheritance-chain write
    pub fn is_partial_write(&self) -> bool {
        matches!(self, Self::PartialWrite { .. })
    }

    /// The statement text attached to a prepare/execute failure, if any.
    pub fn statement(&self) -> Option<&str> {
        match self {
            Self::Prepare { sql, .. } | Self::Execute { sql, .. } => Some(sql),
            Self::PartialWrite { source, .. } => source.statement(),
            _ => None,
        }
    }

    /// The argument vector attached to an execute failure.
    ///
    /// Prepare failures carry no arguments: the statement never got far
    /// enough for them to matter.
    pub fn arguments(&self) -> Option<&[Value]> {
        match self {
            Self::Execute { args, .. } => Some(args),
            Self::PartialWrite { source, .. } => source.arguments(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execute_error_keeps_statement_and_args() {
        let err = OrmError::Execute {
            sql: "SELECT 1".into(),
            args: vec![Value::Int(1)],
            source: "boom".into(),
        };
        assert_eq!(err.statement(), Some("SELECT 1"));
        assert_eq!(err.arguments(), Some(&[Value::Int(1)][..]));
        assert!(err.to_string().contains("1 argument(s)"));
    }

    #[test]
    fn prepare_error_has_no_args() {
        let err = OrmError::Prepare {
            sql: "SELEC 1".into(),
            source: "syntax".into(),
        };
        assert_eq!(err.statement(), Some("SELEC 1"));
        assert!(err.arguments().is_none());
    }

    #[test]
    fn partial_write_delegates_to_source() {
        let err = OrmError::PartialWrite {
            written: vec!["entries".into()],
            table: "posts".into(),
            source: Box::new(OrmError::Execute {
                sql: "INSERT".into(),
                args: vec![],
                source: "dup".into(),
            }),
        };
        assert!(err.is_partial_write());
        assert_eq!(err.statement(), Some("INSERT"));
    }
}
