//! SQL dialects.
//!
//! A [`Dialect`] turns schemas into DDL and owns everything that differs
//! between database engines: identifier and literal quoting, type names,
//! column constraints, primary-key placement, the shape of `INSERT` and
//! `LIMIT`, and whether an inheritance chain can be updated in a single
//! multi-table `UPDATE`. Rendering is pure; nothing here performs I/O.

mod mysql;
mod sqlite;

pub use mysql::MySql;
pub use sqlite::Sqlite;


use crate::error::OrmResult;
use crate::schema::{Column, DefaultValue, Index, Schema};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Built-in dialect selector (used by configuration).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    #[default]
    MySql,
    Sqlite,
}

impl DialectKind {
    pub fn dialect(self) -> Arc<dyn Dialect> {
        match self {
            DialectKind::MySql => Arc::new(MySql),
            DialectKind::Sqlite => Arc::new(Sqlite),
        }
    }
}

/// A SQL rendering target.
pub trait Dialect: fmt::Debug + Send + Sync {
    /// Short name used in errors and logs.
    fn name(&self) -> &'static str;

    fn quote_identifier(&self, name: &str) -> String;

    fn quote_literal(&self, value: &Value) -> String;

    /// The column's type, e.g. `VARCHAR(64)`.
    fn render_type_name(&self, column: &Column) -> OrmResult<String>;

    /// Everything after the type, e.g. `NOT NULL DEFAULT 0`.
    fn render_column_constraint(&self, column: &Column) -> OrmResult<String>;

    /// Trailing `PRIMARY KEY(...)` table constraint, when the dialect does not
    /// inline it on the column.
    fn render_primary_key_clause(&self, schema: &Schema) -> OrmResult<Option<String>>;

    /// Text appended after the closing parenthesis of `CREATE TABLE`.
    fn table_options(&self) -> &'static str {
        ""
    }

    /// Whether an inheritance chain may be written with one multi-table `UPDATE`.
    fn supports_multi_table_update(&self) -> bool;

    /// `INSERT` statement for `columns`, with one `?` per column.
    fn render_insert(&self, table: &str, columns: &[&str]) -> String;

    /// `LIMIT`/`OFFSET` clause without a leading space.
    fn render_limit(&self, limit: Option<u64>, offset: Option<u64>) -> Option<String>;

    fn render_create_table(&self, table: &str, schema: &Schema) -> OrmResult<String> {
        let mut parts = Vec::with_capacity(schema.columns().len() + 1);
        for column in schema.columns() {
            let mut def = format!(
                "{} {}",
                self.quote_identifier(&column.name),
                self.render_type_name(column)?
            );
            let constraint = self.render_column_constraint(column)?;
            if !constraint.is_empty() {
                def.push(' ');
                def.push_str(&constraint);
            }
            parts.push(def);
        }
        if let Some(pk) = self.render_primary_key_clause(schema)? {
            parts.push(pk);
        }
        Ok(format!(
            "CREATE TABLE {} ({}){}",
            self.quote_identifier(table),
            parts.join(", "),
            self.table_options()
        ))
    }

    fn render_create_index(&self, table: &str, index: &Index) -> String {
        format!(
            "CREATE {}INDEX {} ON {} ({})",
            if index.unique { "UNIQUE " } else { "" },
            self.quote_identifier(&index.name_for(table)),
            self.quote_identifier(table),
            self.quote_list(&index.columns)
        )
    }

    fn render_drop_table(&self, table: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", self.quote_identifier(table))
    }

    /// Quote and comma-join a list of identifiers.
    fn quote_list(&self, names: &[String]) -> String {
        names
            .iter()
            .map(|n| self.quote_identifier(n))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Quote `name` with `quote`, doubling embedded quote characters.
pub(crate) fn quote_with(name: &str, quote: char) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push(quote);
    for ch in name.chars() {
        if ch == quote {
            out.push(quote);
        }
        out.push(ch);
    }
    out.push(quote);
    out
}

/// Literal rendering shared by both dialects; `escape_backslash` is MySQL's
/// extra escaping rule.
pub(crate) fn literal(value: &Value, escape_backslash: bool) -> String {
    match value.clone().normalized() {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => if b { "1" } else { "0" }.to_string(),
        Value::Int(i) => i.to_string(),
        Value::UInt(u) => u.to_string(),
        Value::Float(f) if f.is_finite() => f.to_string(),
        Value::Float(_) => "NULL".to_string(),
        Value::Bytes(bytes) => {
            let hex: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
            format!("X'{hex}'")
        }
        Value::Text(s) => {
            let mut out = String::with_capacity(s.len() + 2);
            out.push('\'');
            for ch in s.chars() {
                match ch {
                    '\'' => out.push_str("''"),
                    '\\' if escape_backslash => out.push_str("\\\\"),
                    _ => out.push(ch),
                }
            }
            out.push('\'');
            out
        }
        other => literal(&Value::Text(other.key_fragment()), escape_backslash),
    }
}

/// `DEFAULT ...` fragment for a literal default.
pub(crate) fn default_literal(dialect: &dyn Dialect, default: &DefaultValue) -> Option<String> {
    match default {
        DefaultValue::Value(v) => Some(format!("DEFAULT {}", dialect.quote_literal(v))),
        DefaultValue::CurrentTimestamp => None,
    }
}
