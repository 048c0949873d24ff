use super::{Dialect, default_literal, literal, quote_with};
use crate::error::{OrmError, OrmResult};
use crate::schema::{Column, ColumnKind, DefaultValue, PrimaryKey, Schema};
use crate::value::Value;

/// SQLite, rendering `STRICT` tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sqlite;

const NAME: &str = "sqlite";

/// Collations built into SQLite.
const COLLATIONS: [&str; 3] = ["BINARY", "NOCASE", "RTRIM"];

/// Largest decimal precision a REAL column holds exactly.
const REAL_DIGITS: u32 = 15;

fn err(column: &Column, message: impl Into<String>) -> OrmError {
    OrmError::render(NAME, &column.name, message)
}

fn non_zero(column: &Column, size: u32, ty: &'static str) -> OrmResult<&'static str> {
    if size == 0 {
        return Err(err(column, "size must be greater than 0"));
    }
    Ok(ty)
}

impl Dialect for Sqlite {
    fn name(&self) -> &'static str {
        NAME
    }

    fn quote_identifier(&self, name: &str) -> String {
        quote_with(name, '"')
    }

    fn quote_literal(&self, value: &Value) -> String {
        literal(value, false)
    }

    fn render_type_name(&self, column: &Column) -> OrmResult<String> {
        let ty = match column.kind {
            ColumnKind::Boolean | ColumnKind::Integer { .. } | ColumnKind::Serial => "INTEGER",
            ColumnKind::Decimal { precision, .. } => {
                if precision == 0 || precision > REAL_DIGITS {
                    return Err(err(
                        column,
                        format!("decimal precision {precision} cannot be stored exactly as REAL"),
                    ));
                }
                "REAL"
            }
            ColumnKind::Float { .. } => "REAL",
            ColumnKind::Char { size } | ColumnKind::Varchar { size } => {
                non_zero(column, size, "TEXT")?
            }
            ColumnKind::Binary { size } | ColumnKind::Varbinary { size } => {
                non_zero(column, size, "BLOB")?
            }
            ColumnKind::Text(_) => "TEXT",
            ColumnKind::Blob(_) => "BLOB",
            ColumnKind::Date | ColumnKind::Time | ColumnKind::DateTime | ColumnKind::Timestamp => {
                "TEXT"
            }
        };
        Ok(ty.to_string())
    }

    fn render_column_constraint(&self, column: &Column) -> OrmResult<String> {
        if column.auto_increment {
            if !column.primary
                || !matches!(column.kind, ColumnKind::Integer { .. } | ColumnKind::Serial)
            {
                return Err(err(
                    column,
                    "AUTOINCREMENT is only allowed on the integer primary key",
                ));
            }
            return Ok("PRIMARY KEY AUTOINCREMENT".to_string());
        }

        let mut parts: Vec<String> = Vec::new();
        if !column.nullable {
            parts.push("NOT NULL".to_string());
        }
        if column.unique && !column.primary {
            parts.push("UNIQUE".to_string());
        }
        match &column.default {
            Some(DefaultValue::CurrentTimestamp) => {
                let keyword = match column.kind {
                    ColumnKind::Date => "CURRENT_DATE",
                    ColumnKind::Time => "CURRENT_TIME",
                    ColumnKind::DateTime | ColumnKind::Timestamp => "CURRENT_TIMESTAMP",
                    _ => {
                        return Err(err(
                            column,
                            "current timestamp default requires a date/time column",
                        ));
                    }
                };
                parts.push(format!("DEFAULT {keyword}"));
            }
            Some(default) => parts.extend(default_literal(self, default)),
            None => {}
        }
        if let Some(collation) = &column.collation {
            let upper = collation.to_ascii_uppercase();
            if !COLLATIONS.contains(&upper.as_str()) {
                return Err(err(column, format!("unsupported collation '{collation}'")));
            }
            parts.push(format!("COLLATE {upper}"));
        }
        Ok(parts.join(" "))
    }

    fn render_primary_key_clause(&self, schema: &Schema) -> OrmResult<Option<String>> {
        let inline = schema.columns().iter().find(|c| c.auto_increment);
        match (schema.primary_key(), inline) {
            (PrimaryKey::None, _) => Ok(None),
            (PrimaryKey::Single(_), Some(_)) => Ok(None),
            (PrimaryKey::Composite(_), Some(column)) => Err(err(
                column,
                "AUTOINCREMENT cannot be part of a composite primary key",
            )),
            (pk, None) => Ok(Some(format!("PRIMARY KEY({})", self.quote_list(pk.columns())))),
        }
    }

    fn table_options(&self) -> &'static str {
        " STRICT"
    }

    fn supports_multi_table_update(&self) -> bool {
        false
    }

    fn render_insert(&self, table: &str, columns: &[&str]) -> String {
        if columns.is_empty() {
            return format!("INSERT INTO {} DEFAULT VALUES", self.quote_identifier(table));
        }
        let names: Vec<String> = columns.iter().map(|c| self.quote_identifier(c)).collect();
        let marks = vec!["?"; columns.len()];
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.quote_identifier(table),
            names.join(", "),
            marks.join(", ")
        )
    }

    fn render_limit(&self, limit: Option<u64>, offset: Option<u64>) -> Option<String> {
        match (limit, offset) {
            (None, None) => None,
            (Some(n), None) => Some(format!("LIMIT {n}")),
            (Some(n), Some(m)) => Some(format!("LIMIT {n} OFFSET {m}")),
            (None, Some(m)) => Some(format!("LIMIT -1 OFFSET {m}")),
        }
    }
}
