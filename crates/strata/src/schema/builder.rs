use super::column::{Column, ColumnKind, IntSize, SizeClass};
use super::{Index, Schema};
use crate::error::{OrmError, OrmResult};
use crate::ident::validate_name;

/// Structural metadata carried by a record type.
///
/// This trait is implemented by `#[derive(Entity)]`; it can also be written
/// by hand.
pub trait Schematic {
    /// Unprefixed table name.
    const TABLE: &'static str;

    /// Declare this type's columns and indexes.
    fn describe(builder: &mut SchemaBuilder) -> OrmResult<()>;
}

/// Fluent accumulator producing [`Schema`]s.
///
/// Every `add_*` method appends a column (replacing an earlier column of the
/// same name in place) and returns it for chained constraints.
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    columns: Vec<Column>,
    indexes: Vec<Index>,
    error: Option<String>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a schema from a record type's structural metadata.
    pub fn of<T: Schematic>() -> OrmResult<Schema> {
        let mut builder = Self::new();
        T::describe(&mut builder)?;
        builder.try_build()
    }

    /// Append a column definition.
    pub fn add_column(&mut self, column: Column) -> &mut Column {
        if self.error.is_none() {
            if validate_name(&column.name).is_err() {
                self.error = Some(format!("invalid column name '{}'", column.name));
            }
        }
        let pos = match self.columns.iter().position(|c| c.name == column.name) {
            Some(pos) => {
                self.columns[pos] = column;
                pos
            }
            None => {
                self.columns.push(column);
                self.columns.len() - 1
            }
        };
        &mut self.columns[pos]
    }

    fn add(&mut self, name: &str, kind: ColumnKind) -> &mut Column {
        self.add_column(Column::new(name, kind))
    }

    pub fn add_boolean(&mut self, name: &str) -> &mut Column {
        self.add(name, ColumnKind::Boolean)
    }

    pub fn add_integer(&mut self, name: &str, size: IntSize) -> &mut Column {
        self.add(
            name,
            ColumnKind::Integer {
                size,
                unsigned: false,
            },
        )
    }

    pub fn add_unsigned(&mut self, name: &str, size: IntSize) -> &mut Column {
        self.add(
            name,
            ColumnKind::Integer {
                size,
                unsigned: true,
            },
        )
    }

    pub fn add_decimal(&mut self, name: &str, precision: u32, scale: u32) -> &mut Column {
        self.add(name, ColumnKind::Decimal { precision, scale })
    }

    pub fn add_float(&mut self, name: &str) -> &mut Column {
        self.add(name, ColumnKind::Float { double: false })
    }

    pub fn add_double(&mut self, name: &str) -> &mut Column {
        self.add(name, ColumnKind::Float { double: true })
    }

    pub fn add_char(&mut self, name: &str, size: u32) -> &mut Column {
        self.add(name, ColumnKind::Char { size })
    }

    pub fn add_varchar(&mut self, name: &str, size: u32) -> &mut Column {
        self.add(name, ColumnKind::Varchar { size })
    }

    pub fn add_binary(&mut self, name: &str, size: u32) -> &mut Column {
        self.add(name, ColumnKind::Binary { size })
    }

    pub fn add_varbinary(&mut self, name: &str, size: u32) -> &mut Column {
        self.add(name, ColumnKind::Varbinary { size })
    }

    pub fn add_text(&mut self, name: &str, class: SizeClass) -> &mut Column {
        self.add(name, ColumnKind::Text(class))
    }

    pub fn add_blob(&mut self, name: &str, class: SizeClass) -> &mut Column {
        self.add(name, ColumnKind::Blob(class))
    }

    pub fn add_date(&mut self, name: &str) -> &mut Column {
        self.add(name, ColumnKind::Date)
    }

    pub fn add_time(&mut self, name: &str) -> &mut Column {
        self.add(name, ColumnKind::Time)
    }

    pub fn add_datetime(&mut self, name: &str) -> &mut Column {
        self.add(name, ColumnKind::DateTime)
    }

    pub fn add_timestamp(&mut self, name: &str) -> &mut Column {
        self.add(name, ColumnKind::Timestamp)
    }

    /// Big unsigned auto-increment primary key.
    pub fn add_serial(&mut self, name: &str) -> &mut Column {
        self.add_column(Column::serial(name))
    }

    /// Big unsigned integer referencing a serial key elsewhere.
    pub fn add_foreign(&mut self, name: &str) -> &mut Column {
        self.add_column(Column::foreign(name))
    }

    /// Append an index over already-declared columns.
    pub fn add_index(
        &mut self,
        columns: &[&str],
        unique: bool,
        name: Option<&str>,
    ) -> OrmResult<&mut Self> {
        if columns.is_empty() {
            return Err(OrmError::config("index must name at least one column"));
        }
        if let Some(missing) = columns.iter().find(|c| !self.has_column(c)) {
            return Err(OrmError::config(format!(
                "index references undeclared column '{missing}'"
            )));
        }
        if let Some(name) = name {
            validate_name(name)?;
        }
        self.indexes.push(Index {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique,
            name: name.map(str::to_string),
        });
        Ok(self)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Snapshot the current state. May be called repeatedly.
    ///
    /// Column names are not checked here; [`try_build`](Self::try_build)
    /// reports them, and so does building a table from the schema.
    pub fn build(&self) -> Schema {
        Schema::from_parts(self.columns.clone(), self.indexes.clone())
    }

    /// Like [`build`](Self::build), but surfaces invalid column names.
    pub fn try_build(&self) -> OrmResult<Schema> {
        if let Some(err) = &self.error {
            return Err(OrmError::validation(err.clone()));
        }
        Ok(self.build())
    }
}
