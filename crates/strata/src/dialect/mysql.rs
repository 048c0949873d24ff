use super::{Dialect, default_literal, literal, quote_with};
use crate::error::{OrmError, OrmResult};
use crate::schema::{Column, ColumnKind, DefaultValue, IntSize, Schema, SizeClass};
use crate::value::Value;

/// MySQL / MariaDB.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySql;

const NAME: &str = "mysql";

fn err(column: &Column, message: impl Into<String>) -> OrmError {
    OrmError::render(NAME, &column.name, message)
}

fn sized(column: &Column, ty: &str, size: u32, max: u32) -> OrmResult<String> {
    if size == 0 || size > max {
        return Err(err(
            column,
            format!("{ty} size {size} is outside 1..={max}"),
        ));
    }
    Ok(format!("{ty}({size})"))
}

fn size_prefix(class: SizeClass) -> &'static str {
    match class {
        SizeClass::Tiny => "TINY",
        SizeClass::Normal => "",
        SizeClass::Medium => "MEDIUM",
        SizeClass::Long => "LONG",
    }
}

fn is_textual(kind: &ColumnKind) -> bool {
    matches!(
        kind,
        ColumnKind::Char { .. } | ColumnKind::Varchar { .. } | ColumnKind::Text(_)
    )
}

impl Dialect for MySql {
    fn name(&self) -> &'static str {
        NAME
    }

    fn quote_identifier(&self, name: &str) -> String {
        quote_with(name, '`')
    }

    fn quote_literal(&self, value: &Value) -> String {
        literal(value, true)
    }

    fn render_type_name(&self, column: &Column) -> OrmResult<String> {
        let ty = match column.kind {
            ColumnKind::Boolean => "TINYINT(1)".to_string(),
            ColumnKind::Integer { size, unsigned } => {
                let base = match size {
                    IntSize::Tiny => "TINYINT",
                    IntSize::Small => "SMALLINT",
                    IntSize::Medium => "MEDIUMINT",
                    IntSize::Normal => "INT",
                    IntSize::Big => "BIGINT",
                };
                if unsigned {
                    format!("{base} UNSIGNED")
                } else {
                    base.to_string()
                }
            }
            ColumnKind::Serial => "BIGINT UNSIGNED".to_string(),
            ColumnKind::Decimal { precision, scale } => {
                if precision == 0 || precision > 65 {
                    return Err(err(
                        column,
                        format!("decimal precision {precision} is outside 1..=65"),
                    ));
                }
                if scale > 30 || scale > precision {
                    return Err(err(
                        column,
                        format!("decimal scale {scale} exceeds 30 or precision {precision}"),
                    ));
                }
                format!("DECIMAL({precision},{scale})")
            }
            ColumnKind::Float { double } => if double { "DOUBLE" } else { "FLOAT" }.to_string(),
            ColumnKind::Char { size } => sized(column, "CHAR", size, 255)?,
            ColumnKind::Varchar { size } => sized(column, "VARCHAR", size, 65_535)?,
            ColumnKind::Binary { size } => sized(column, "BINARY", size, 255)?,
            ColumnKind::Varbinary { size } => sized(column, "VARBINARY", size, 65_535)?,
            ColumnKind::Text(class) => format!("{}TEXT", size_prefix(class)),
            ColumnKind::Blob(class) => format!("{}BLOB", size_prefix(class)),
            ColumnKind::Date => "DATE".to_string(),
            ColumnKind::Time => "TIME".to_string(),
            ColumnKind::DateTime => "DATETIME".to_string(),
            ColumnKind::Timestamp => "TIMESTAMP".to_string(),
        };
        Ok(ty)
    }

    fn render_column_constraint(&self, column: &Column) -> OrmResult<String> {
        let mut parts: Vec<String> = Vec::new();
        parts.push(if column.nullable { "NULL" } else { "NOT NULL" }.to_string());

        match &column.default {
            Some(DefaultValue::CurrentTimestamp) => {
                if !matches!(column.kind, ColumnKind::DateTime | ColumnKind::Timestamp) {
                    return Err(err(
                        column,
                        "CURRENT_TIMESTAMP default requires a DATETIME or TIMESTAMP column",
                    ));
                }
                parts.push("DEFAULT CURRENT_TIMESTAMP".to_string());
            }
            Some(default) => {
                if matches!(column.kind, ColumnKind::Text(_) | ColumnKind::Blob(_)) {
                    return Err(err(column, "TEXT and BLOB columns cannot have a default value"));
                }
                parts.extend(default_literal(self, default));
            }
            None => {}
        }

        if column.auto_increment {
            if !matches!(column.kind, ColumnKind::Integer { .. } | ColumnKind::Serial) {
                return Err(err(column, "AUTO_INCREMENT requires an integer column"));
            }
            parts.push("AUTO_INCREMENT".to_string());
        }
        if column.unique && !column.primary {
            parts.push("UNIQUE".to_string());
        }
        if let Some(collation) = &column.collation {
            if !is_textual(&column.kind) {
                return Err(err(column, "collation requires a character column"));
            }
            parts.push(format!("COLLATE {collation}"));
        }
        Ok(parts.join(" "))
    }

    fn render_primary_key_clause(&self, schema: &Schema) -> OrmResult<Option<String>> {
        let columns = schema.primary_key().columns();
        if columns.is_empty() {
            return Ok(None);
        }
        Ok(Some(format!("PRIMARY KEY({})", self.quote_list(columns))))
    }

    fn table_options(&self) -> &'static str {
        " ENGINE=InnoDB"
    }

    fn supports_multi_table_update(&self) -> bool {
        true
    }

    fn render_insert(&self, table: &str, columns: &[&str]) -> String {
        if columns.is_empty() {
            return format!("INSERT INTO {} () VALUES ()", self.quote_identifier(table));
        }
        let assignments: Vec<String> = columns
            .iter()
            .map(|c| format!("{} = ?", self.quote_identifier(c)))
            .collect();
        format!(
            "INSERT INTO {} SET {}",
            self.quote_identifier(table),
            assignments.join(", ")
        )
    }

    fn render_limit(&self, limit: Option<u64>, offset: Option<u64>) -> Option<String> {
        match (limit, offset) {
            (None, None) => None,
            (Some(n), None) => Some(format!("LIMIT {n}")),
            (Some(n), Some(m)) => Some(format!("LIMIT {n} OFFSET {m}")),
            // MySQL has no bare OFFSET; the documented idiom is the max row count.
            (None, Some(m)) => Some(format!("LIMIT {} OFFSET {m}", u64::MAX)),
        }
    }
}
