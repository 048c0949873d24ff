//! Tables and the inheritance join algebra.
//!
//! A [`Table`] binds a [`Schema`] to a physical (prefixed) name and an
//! alias, and optionally to a parent table whose rows share this table's
//! primary key. The ancestor chain is resolved once at construction and
//! stored nearest-first. The extended schema and the join fragments used
//! by reads and writes are computed at the same time and never rebuilt.
//!
//! ```
//! use std::sync::Arc;
//! use strata::dialect::MySql;
//! use strata::schema::SchemaBuilder;
//! use strata::table::Table;
//!
//! let mut entries = SchemaBuilder::new();
//! entries.add_serial("id");
//! entries.add_datetime("created_at");
//! let entries = Arc::new(Table::builder("blog_entries", entries.build(), Arc::new(MySql)).build()?);
//!
//! let mut posts = SchemaBuilder::new();
//! posts.add_foreign("id").primary();
//! posts.add_varchar("title", 200);
//! let posts = Table::builder("blog_posts", posts.build(), Arc::new(MySql))
//!     .parent(entries)
//!     .build()?;
//!
//! assert_eq!(posts.alias(), "post");
//! assert_eq!(
//!     posts.resolve_statement("SELECT * FROM {self_and_related}")?,
//!     "SELECT * FROM `blog_posts` `post` INNER JOIN `blog_entries` `entry` USING(`id`)"
//! );
//! # Ok::<(), strata::OrmError>(())
//! ```

mod write;


use crate::cache::{NoCache, RecordCache};
use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::executor::SqlLog;
use crate::ident::validate_name;
use crate::schema::{PrimaryKey, Schema};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// A table always joined into reads, sharing this table's primary key.
#[derive(Debug, Clone)]
pub struct Implement {
    pub table: Arc<Table>,
    /// Join with `LEFT JOIN` instead of `INNER JOIN`.
    pub loose: bool,
}

/// A schema bound to a physical table.
pub struct Table {
    name: String,
    prefix: String,
    physical: String,
    alias: String,
    schema: Arc<Schema>,
    extended: Schema,
    ancestors: Vec<Arc<Table>>,
    implements: Vec<Implement>,
    dialect: Arc<dyn Dialect>,
    cache: Arc<dyn RecordCache>,
    log: SqlLog,
    update_join: String,
    select_join: String,
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("physical", &self.physical)
            .field("alias", &self.alias)
            .field(
                "ancestors",
                &self.ancestors.iter().map(|t| t.physical.as_str()).collect::<Vec<_>>(),
            )
            .field("dialect", &self.dialect.name())
            .finish_non_exhaustive()
    }
}

impl Table {
    pub fn builder(
        name: impl Into<String>,
        schema: impl Into<Arc<Schema>>,
        dialect: Arc<dyn Dialect>,
    ) -> TableBuilder {
        TableBuilder {
            name: name.into(),
            schema: schema.into(),
            dialect,
            prefix: String::new(),
            alias: None,
            parent: None,
            implements: Vec::new(),
            cache: None,
            log: SqlLog::default(),
        }
    }

    /// Unprefixed name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Prefixed name, as stored in the database.
    pub fn physical(&self) -> &str {
        &self.physical
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// This table's own columns.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Own columns merged with every ancestor's, most-ancestral first.
    pub fn extended_schema(&self) -> &Schema {
        &self.extended
    }

    pub fn parent(&self) -> Option<&Arc<Table>> {
        self.ancestors.first()
    }

    /// Ancestor chain, nearest first.
    pub fn ancestors(&self) -> &[Arc<Table>] {
        &self.ancestors
    }

    pub fn implements(&self) -> &[Implement] {
        &self.implements
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    pub(crate) fn dialect_arc(&self) -> &Arc<dyn Dialect> {
        &self.dialect
    }

    pub fn cache(&self) -> &dyn RecordCache {
        self.cache.as_ref()
    }

    pub(crate) fn sql_log(&self) -> &SqlLog {
        &self.log
    }

    pub fn primary_key(&self) -> &PrimaryKey {
        self.schema.primary_key()
    }

    /// `INNER JOIN <ancestor> <alias> USING(<primary>)` per ancestor, nearest first.
    pub fn update_join(&self) -> &str {
        &self.update_join
    }

    /// `<physical> <alias>` followed by the update join and any implements joins.
    pub fn select_join(&self) -> &str {
        &self.select_join
    }

    pub fn quoted_physical(&self) -> String {
        self.dialect.quote_identifier(&self.physical)
    }

    pub fn quoted_alias(&self) -> String {
        self.dialect.quote_identifier(&self.alias)
    }

    /// `<alias>.<column>` for the nearest table in the chain that declares
    /// `column`, or the bare quoted column when none does.
    pub fn qualify(&self, column: &str) -> String {
        let d = self.dialect.as_ref();
        match self.owner_of(column) {
            Some(owner) => format!(
                "{}.{}",
                d.quote_identifier(&owner.alias),
                d.quote_identifier(column)
            ),
            None => d.quote_identifier(column),
        }
    }

    /// Unquoted `alias.column` path, resolved like [`qualify`](Self::qualify).
    pub fn column_path(&self, column: &str) -> String {
        match self.owner_of(column) {
            Some(owner) => format!("{}.{column}", owner.alias),
            None => column.to_string(),
        }
    }

    /// How this table appears on the right of a `JOIN`: `<physical> <alias>`,
    /// or the whole select join in parentheses when other tables join in.
    pub(crate) fn join_source(&self) -> String {
        if self.ancestors.is_empty() && self.implements.is_empty() {
            format!("{} {}", self.quoted_physical(), self.quoted_alias())
        } else {
            format!("({})", self.select_join)
        }
    }

    fn owner_of(&self, column: &str) -> Option<&Table> {
        std::iter::once(self)
            .chain(self.ancestors.iter().map(Arc::as_ref))
            .find(|t| t.schema.has_column(column))
    }

    /// This table followed by its ancestors (nearest first).
    pub(crate) fn chain(&self) -> impl DoubleEndedIterator<Item = &Table> {
        std::iter::once(self).chain(self.ancestors.iter().map(Arc::as_ref))
    }

    /// Substitute structural placeholders in a statement template.
    ///
    /// | token                | replaced with                              |
    /// |----------------------|--------------------------------------------|
    /// | `{self}`             | quoted physical name                       |
    /// | `{alias}`            | quoted alias                               |
    /// | `{primary}`          | quoted primary-key column (single keys)    |
    /// | `{primary.N}`        | quoted N-th primary-key column (0-based)   |
    /// | `{self_and_related}` | the select join fragment                   |
    /// | `{prefix}`           | the raw table prefix                       |
    ///
    /// Other brace groups are left untouched. A bare `{primary}` on a
    /// composite key is a configuration error.
    pub fn resolve_statement(&self, text: &str) -> OrmResult<String> {
        let mut out = String::with_capacity(text.len() + 32);
        let mut rest = text;
        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let tail = &rest[start..];
            let Some(end) = tail.find('}') else {
                out.push_str(tail);
                return Ok(out);
            };
            let token = &tail[1..end];
            match self.placeholder(token)? {
                Some(replacement) => out.push_str(&replacement),
                None => out.push_str(&tail[..=end]),
            }
            rest = &tail[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    fn placeholder(&self, token: &str) -> OrmResult<Option<String>> {
        let d = self.dialect.as_ref();
        let replacement = match token {
            "self" => self.quoted_physical(),
            "alias" => self.quoted_alias(),
            "self_and_related" => self.select_join.clone(),
            "prefix" => self.prefix.clone(),
            "primary" => match self.primary_key() {
                PrimaryKey::Single(name) => d.quote_identifier(name),
                PrimaryKey::None => {
                    return Err(OrmError::config(format!(
                        "{{primary}} used on table '{}' which has no primary key",
                        self.name
                    )));
                }
                PrimaryKey::Composite(_) => {
                    return Err(OrmError::config(format!(
                        "table '{}' has a composite primary key; use {{primary.N}}",
                        self.name
                    )));
                }
            },
            other => {
                let Some(index) = other.strip_prefix("primary.") else {
                    return Ok(None);
                };
                let columns = self.primary_key().columns();
                let column = index
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| columns.get(i))
                    .ok_or_else(|| {
                        OrmError::config(format!(
                            "{{{other}}} is out of range for table '{}'",
                            self.name
                        ))
                    })?;
                d.quote_identifier(column)
            }
        };
        Ok(Some(replacement))
    }
}

/// Builder for [`Table`].
pub struct TableBuilder {
    name: String,
    schema: Arc<Schema>,
    dialect: Arc<dyn Dialect>,
    prefix: String,
    alias: Option<String>,
    parent: Option<Arc<Table>>,
    implements: Vec<Implement>,
    cache: Option<Arc<dyn RecordCache>>,
    log: SqlLog,
}

impl TableBuilder {
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn parent(mut self, parent: Arc<Table>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn implements(mut self, table: Arc<Table>, loose: bool) -> Self {
        self.implements.push(Implement { table, loose });
        self
    }

    pub fn cache(mut self, cache: Arc<dyn RecordCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn sql_log(mut self, log: SqlLog) -> Self {
        self.log = log;
        self
    }

    pub fn build(self) -> OrmResult<Table> {
        validate_name(&self.name)?;
        let physical = format!("{}{}", self.prefix, self.name);
        validate_name(&physical)?;
        let alias = match self.alias {
            Some(alias) => alias,
            None => derive_alias(&self.name),
        };
        validate_name(&alias)?;
        for column in self.schema.columns() {
            validate_name(&column.name)?;
        }

        let key = self.schema.primary_key().columns();
        let needs_key = self.parent.is_some() || !self.implements.is_empty();
        if needs_key && key.is_empty() {
            return Err(OrmError::config(format!(
                "table '{}' joins related tables but has no primary key",
                self.name
            )));
        }

        let mut ancestors = Vec::new();
        if let Some(parent) = self.parent {
            if parent.primary_key().columns() != key {
                return Err(OrmError::config(format!(
                    "table '{}' must share primary key {:?} with parent '{}'",
                    self.name,
                    parent.primary_key().columns(),
                    parent.name
                )));
            }
            ancestors.push(parent.clone());
            ancestors.extend(parent.ancestors.iter().cloned());
        }
        let mut seen = HashSet::new();
        let joined = std::iter::once(&alias)
            .chain(ancestors.iter().map(|t| &t.alias))
            .chain(self.implements.iter().map(|i| &i.table.alias));
        for a in joined {
            if !seen.insert(a.as_str()) {
                return Err(OrmError::config(format!(
                    "alias '{a}' is used more than once in the joins of '{}'",
                    self.name
                )));
            }
        }

        let d = self.dialect.as_ref();
        let using = format!("USING({})", d.quote_list(key));
        let mut update_join = String::new();
        for ancestor in &ancestors {
            update_join.push_str(&format!(
                " INNER JOIN {} {} {using}",
                d.quote_identifier(&ancestor.physical),
                d.quote_identifier(&ancestor.alias)
            ));
        }
        let mut select_join = format!(
            "{} {}{update_join}",
            d.quote_identifier(&physical),
            d.quote_identifier(&alias)
        );
        for implement in &self.implements {
            select_join.push_str(&format!(
                " {} {} {} {using}",
                if implement.loose { "LEFT JOIN" } else { "INNER JOIN" },
                d.quote_identifier(&implement.table.physical),
                d.quote_identifier(&implement.table.alias)
            ));
        }

        let extended = Schema::merged(
            ancestors
                .iter()
                .rev()
                .map(|t| t.schema.as_ref())
                .chain(std::iter::once(self.schema.as_ref())),
        );

        Ok(Table {
            name: self.name,
            prefix: self.prefix,
            physical,
            alias,
            schema: self.schema,
            extended,
            ancestors,
            implements: self.implements,
            dialect: self.dialect,
            cache: self.cache.unwrap_or_else(|| Arc::new(NoCache)),
            log: self.log,
            update_join,
            select_join,
        })
    }
}

/// Singularize the suffix after the last underscore: `blog_categories` -> `category`.
pub fn derive_alias(name: &str) -> String {
    let suffix = name.rsplit('_').find(|s| !s.is_empty()).unwrap_or(name);
    singularize(suffix)
}

fn singularize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        if !stem.is_empty() {
            return format!("{stem}y");
        }
    }
    for ending in ["sses", "shes", "ches", "xes", "zes"] {
        if word.ends_with(ending) {
            return word[..word.len() - 2].to_string();
        }
    }
    if word.ends_with("ss") || word.ends_with("us") || word.ends_with("is") {
        return word.to_string();
    }
    match word.strip_suffix('s') {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => word.to_string(),
    }
}
