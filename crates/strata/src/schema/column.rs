use crate::value::Value;

/// Integer storage width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntSize {
    Tiny,
    Small,
    Medium,
    Normal,
    Big,
}

/// Size class for `TEXT` / `BLOB` columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizeClass {
    Tiny,
    #[default]
    Normal,
    Medium,
    Long,
}

/// The closed set of column kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Boolean,
    Integer { size: IntSize, unsigned: bool },
    Decimal { precision: u32, scale: u32 },
    /// Approximate numeric; `double` selects double precision.
    Float { double: bool },
    Char { size: u32 },
    Varchar { size: u32 },
    Binary { size: u32 },
    Varbinary { size: u32 },
    Text(SizeClass),
    Blob(SizeClass),
    Date,
    Time,
    DateTime,
    Timestamp,
    /// Big unsigned auto-increment key.
    Serial,
}

impl ColumnKind {
    pub fn is_integer(&self) -> bool {
        matches!(self, ColumnKind::Integer { .. } | ColumnKind::Serial | ColumnKind::Boolean)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            ColumnKind::Date | ColumnKind::Time | ColumnKind::DateTime | ColumnKind::Timestamp
        )
    }
}

/// Column default.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    Value(Value),
    /// The dialect's "current timestamp" sentinel.
    CurrentTimestamp,
}

/// One column definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub nullable: bool,
    pub unique: bool,
    pub primary: bool,
    pub default: Option<DefaultValue>,
    pub auto_increment: bool,
    pub collation: Option<String>,
}

impl Column {
    /// A plain, not-null column of `kind`.
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        let mut column = Self {
            name: name.into(),
            kind,
            nullable: false,
            unique: false,
            primary: false,
            default: None,
            auto_increment: false,
            collation: None,
        };
        if kind == ColumnKind::Serial {
            column.primary = true;
            column.auto_increment = true;
        }
        column
    }

    /// Big unsigned auto-increment primary key.
    pub fn serial(name: impl Into<String>) -> Self {
        Self::new(name, ColumnKind::Serial)
    }

    /// Big unsigned integer referencing another table's serial key.
    pub fn foreign(name: impl Into<String>) -> Self {
        Self::new(
            name,
            ColumnKind::Integer {
                size: IntSize::Big,
                unsigned: true,
            },
        )
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ColumnKind::Boolean)
    }

    /// Allow NULL. Ignored for serial and primary key columns, which are
    /// never nullable.
    pub fn nullable(&mut self) -> &mut Self {
        if self.kind != ColumnKind::Serial && !self.primary {
            self.nullable = true;
        }
        self
    }

    pub fn not_null(&mut self) -> &mut Self {
        self.nullable = false;
        self
    }

    pub fn unique(&mut self) -> &mut Self {
        self.unique = true;
        self
    }

    pub fn primary(&mut self) -> &mut Self {
        self.primary = true;
        self.nullable = false;
        self
    }

    /// Demote a serial column from primary key to a unique key.
    pub fn not_primary(&mut self) -> &mut Self {
        self.primary = false;
        if self.kind == ColumnKind::Serial {
            self.unique = true;
        }
        self
    }

    pub fn default(&mut self, value: impl Into<Value>) -> &mut Self {
        self.default = Some(DefaultValue::Value(value.into()));
        self
    }

    pub fn default_current_timestamp(&mut self) -> &mut Self {
        self.default = Some(DefaultValue::CurrentTimestamp);
        self
    }

    pub fn auto_increment(&mut self) -> &mut Self {
        self.auto_increment = true;
        self
    }

    pub fn collate(&mut self, collation: impl Into<String>) -> &mut Self {
        self.collation = Some(collation.into());
        self
    }
}
