//! Table schemas.
//!
//! A [`Schema`] is an immutable, ordered description of a table's columns,
//! its indexes and its derived primary key. Schemas are produced by
//! [`SchemaBuilder`], either from explicit column declarations or from a
//! record type implementing [`Schematic`].
//!
//! ```
//! use strata::schema::{IntSize, SchemaBuilder};
//!
//! let mut b = SchemaBuilder::new();
//! b.add_serial("id");
//! b.add_varchar("email", 190).unique();
//! b.add_integer("age", IntSize::Small).nullable();
//! b.add_index(&["email", "age"], false, None)?;
//! let schema = b.build();
//!
//! assert_eq!(schema.primary_key().columns(), ["id"]);
//! # Ok::<(), strata::OrmError>(())
//! ```

mod builder;
mod column;

pub use builder::{SchemaBuilder, Schematic};
pub use column::{Column, ColumnKind, DefaultValue, IntSize, SizeClass};

#[cfg(test)]
mod tests;

/// A table index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    pub columns: Vec<String>,
    pub unique: bool,
    pub name: Option<String>,
}

impl Index {
    /// The explicit name, or `<table>_<col>..._idx` / `_unique`.
    pub fn name_for(&self, table: &str) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        let suffix = if self.unique { "unique" } else { "idx" };
        format!("{table}_{}_{suffix}", self.columns.join("_"))
    }
}

/// Primary key derived from the columns marked `primary`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PrimaryKey {
    #[default]
    None,
    Single(String),
    Composite(Vec<String>),
}

impl PrimaryKey {
    fn from_columns(mut names: Vec<String>) -> Self {
        match names.len() {
            0 => PrimaryKey::None,
            1 => PrimaryKey::Single(names.remove(0)),
            _ => PrimaryKey::Composite(names),
        }
    }

    /// Key column names in order (empty when there is no key).
    pub fn columns(&self) -> &[String] {
        match self {
            PrimaryKey::None => &[],
            PrimaryKey::Single(name) => std::slice::from_ref(name),
            PrimaryKey::Composite(names) => names,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, PrimaryKey::None)
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, PrimaryKey::Composite(_))
    }
}

/// Immutable table description.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    columns: Vec<Column>,
    indexes: Vec<Index>,
    primary_key: PrimaryKey,
}

impl Schema {
    pub(crate) fn from_parts(columns: Vec<Column>, indexes: Vec<Index>) -> Self {
        let primary_key = PrimaryKey::from_columns(
            columns
                .iter()
                .filter(|c| c.primary)
                .map(|c| c.name.clone())
                .collect(),
        );
        Self {
            columns,
            indexes,
            primary_key,
        }
    }

    /// Columns in declaration order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn indexes(&self) -> &[Index] {
        &self.indexes
    }

    pub fn primary_key(&self) -> &PrimaryKey {
        &self.primary_key
    }

    /// Whether every key column exists in this schema.
    pub fn has_columns<S: AsRef<str>>(&self, names: &[S]) -> bool {
        !names.is_empty() && names.iter().all(|n| self.has_column(n.as_ref()))
    }

    /// Merge schemas, most-ancestral first. A later definition of a column
    /// replaces the earlier one in place; indexes are not inherited.
    pub(crate) fn merged<'a>(chain: impl IntoIterator<Item = &'a Schema>) -> Schema {
        let mut columns: Vec<Column> = Vec::new();
        let mut indexes = Vec::new();
        for schema in chain {
            for column in &schema.columns {
                match columns.iter_mut().find(|c| c.name == column.name) {
                    Some(existing) => *existing = column.clone(),
                    None => columns.push(column.clone()),
                }
            }
            indexes = schema.indexes.clone();
        }
        Schema::from_parts(columns, indexes)
    }
}
