//! Fluent SELECT builder bound to a model.
//!
//! A [`Query`] accumulates fragments in any order and renders them into one
//! statement. Singular clauses (`select`, `group`, `having`, `order`,
//! `limit`, `offset`) overwrite; conditions and joins append. Arguments are
//! kept in three buckets and always emitted as join arguments, then
//! condition arguments, then having arguments.
//!
//! Invalid input (a bad identifier, a placeholder count that does not match
//! the arguments) does not fail at the call site. It is recorded and
//! reported by [`Query::build`] and every finisher.
//!
//! Rendered shape:
//!
//! ```text
//! SELECT <select|*> FROM <self_and_related> [<joins>] [WHERE <c1> AND <c2>...]
//!     [GROUP BY <g>] [HAVING <h>] [ORDER BY <o>] [LIMIT <n> [OFFSET <m>]]
//! ```

mod condition;
mod finish;
mod join;

#[cfg(test)]
mod tests;

pub use condition::{Condition, Conditions, Criterion, IntoCriterion, NEGATION, Op};
pub use join::JoinMode;

use crate::error::{OrmError, OrmResult};
use crate::executor::Statement;
use crate::ident::Ident;
use crate::model::Model;
use crate::table::Table;
use crate::value::Value;
use std::sync::Arc;

/// Whether fetched records go through the model's identity map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    /// Return the cached record for a key when there is one, otherwise
    /// cache what was fetched.
    #[default]
    Identity,
    /// Bypass the identity map entirely.
    Fresh,
}

/// SELECT builder over a model's inheritance join.
#[derive(Debug, Clone)]
pub struct Query {
    model: Arc<Model>,
    /// Custom select expression; `*` when unset.
    select: Option<String>,
    /// Whether the select yields whole rows of the model.
    whole_rows: bool,
    joins: Vec<String>,
    /// Aliases introduced by `join_model` and `join_query`.
    join_aliases: Vec<String>,
    join_args: Vec<Value>,
    conditions: Vec<String>,
    condition_args: Vec<Value>,
    group: Option<String>,
    having: Option<String>,
    having_args: Vec<Value>,
    order: Option<String>,
    limit: Option<u64>,
    offset: Option<u64>,
    mode: FetchMode,
    /// First invalid input, reported on build.
    build_error: Option<Deferred>,
}

/// An error recorded while accumulating, raised by `build`.
#[derive(Debug, Clone)]
enum Deferred {
    Config(String),
    Validation(String),
}

impl From<OrmError> for Deferred {
    fn from(err: OrmError) -> Self {
        match err {
            OrmError::Config(message) => Deferred::Config(message),
            OrmError::Validation(message) => Deferred::Validation(message),
            other => Deferred::Validation(other.to_string()),
        }
    }
}

/// Count `?` placeholders outside quoted spans (`'...'`, `"..."` and
/// backticks). A backslash escapes the next character inside a string.
fn count_placeholders(text: &str) -> usize {
    let mut marks = 0;
    let mut quote: Option<char> = None;
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match quote {
            Some(q) if c == '\\' && q != '`' => {
                chars.next();
            }
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' | '`' => quote = Some(c),
                '?' => marks += 1,
                _ => {}
            },
        }
    }
    marks
}

impl Query {
    pub fn new(model: Arc<Model>) -> Self {
        Self {
            model,
            select: None,
            whole_rows: true,
            joins: Vec::new(),
            join_aliases: Vec::new(),
            join_args: Vec::new(),
            conditions: Vec::new(),
            condition_args: Vec::new(),
            group: None,
            having: None,
            having_args: Vec::new(),
            order: None,
            limit: None,
            offset: None,
            mode: FetchMode::default(),
            build_error: None,
        }
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    pub fn table(&self) -> &Table {
        self.model.table()
    }

    pub fn fetch_mode(&self) -> FetchMode {
        self.mode
    }

    fn fail(&mut self, err: impl Into<Deferred>) {
        if self.build_error.is_none() {
            self.build_error = Some(err.into());
        }
    }

    /// Resolve table placeholders in a raw fragment, recording failures.
    fn resolve(&mut self, text: &str) -> Option<String> {
        match self.model.table().resolve_statement(text) {
            Ok(resolved) => Some(resolved),
            Err(e) => {
                self.fail(e);
                None
            }
        }
    }

    /// Resolve placeholders and check that `text` has one `?` per argument.
    fn raw_fragment(&mut self, what: &str, text: &str, args: Vec<Value>) -> Option<(String, Vec<Value>)> {
        let marks = count_placeholders(text);
        if marks != args.len() {
            self.fail(OrmError::validation(format!(
                "{what} '{text}' has {marks} '?' but {} values were provided",
                args.len()
            )));
            return None;
        }
        let resolved = self.resolve(text)?;
        Some((resolved, args.into_iter().map(Value::normalized).collect()))
    }

    /// A join was added: a bare `SELECT *` now carries foreign columns, so
    /// its rows must stay out of the identity map.
    fn joined(&mut self) {
        if self.select.is_none() {
            self.whole_rows = false;
        }
    }

    // ==================== Select ====================

    /// Set a raw select expression. Table placeholders are resolved.
    pub fn select(&mut self, expr: &str) -> &mut Self {
        if let Some(resolved) = self.resolve(expr) {
            self.select = Some(resolved);
            self.whole_rows = false;
        }
        self
    }

    /// Select a list of (possibly dotted) columns, quoted for the dialect.
    pub fn select_columns(&mut self, columns: &[&str]) -> &mut Self {
        let d = self.model.table().dialect_arc().clone();
        let mut rendered = Vec::with_capacity(columns.len());
        for column in columns {
            match Ident::parse(column) {
                Ok(ident) => rendered.push(ident.render(d.as_ref())),
                Err(e) => {
                    self.fail(e);
                    return self;
                }
            }
        }
        self.select = Some(rendered.join(", "));
        self.whole_rows = false;
        self
    }

    /// Select every column of the model's chain while other tables are
    /// joined in, so the rows still materialize as whole records.
    pub(crate) fn select_model_columns(&mut self) -> &mut Self {
        let table = self.model.table();
        let all: Vec<String> = table
            .chain()
            .map(|t| format!("{}.*", t.quoted_alias()))
            .collect();
        self.select = Some(all.join(", "));
        self.whole_rows = true;
        self
    }

    // ==================== Conditions ====================

    fn push_condition(&mut self, condition: &Condition) {
        let d = self.model.table().dialect_arc().clone();
        let sql = condition.build(d.as_ref(), &mut self.condition_args);
        self.conditions.push(sql);
    }

    /// Add every `{column: criterion}` entry, AND-joined.
    ///
    /// A `!` in front of a column negates it; list criteria become `IN`.
    pub fn filter(&mut self, conditions: Conditions) -> &mut Self {
        for (key, criterion) in conditions {
            match Condition::parse(&key, criterion) {
                Ok(condition) => self.push_condition(&condition),
                Err(e) => self.fail(e),
            }
        }
        self
    }

    /// `column = ?` (`IS NULL` for a null value).
    pub fn where_eq(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        self.where_op(column, Criterion::Value(value.into()).into_op(false))
    }

    /// `column IN(...)` with the values inlined as literals.
    pub fn where_in<T: Into<Value>>(
        &mut self,
        column: &str,
        values: impl IntoIterator<Item = T>,
    ) -> &mut Self {
        self.where_op(column, Op::in_list(values))
    }

    pub fn where_op(&mut self, column: &str, op: Op) -> &mut Self {
        match Condition::new(column, op) {
            Ok(condition) => self.push_condition(&condition),
            Err(e) => self.fail(e),
        }
        self
    }

    /// Add a raw condition with `?` placeholders, wrapped in parentheses.
    ///
    /// Table placeholders such as `{alias}` are resolved when added.
    pub fn where_raw<T: Into<Value>>(
        &mut self,
        sql: &str,
        args: impl IntoIterator<Item = T>,
    ) -> &mut Self {
        let args = args.into_iter().map(Into::into).collect();
        if let Some((sql, args)) = self.raw_fragment("condition", sql, args) {
            self.conditions.push(format!("({sql})"));
            self.condition_args.extend(args);
        }
        self
    }

    // ==================== Grouping, ordering & pagination ====================

    pub fn group(&mut self, expr: &str) -> &mut Self {
        if let Some(resolved) = self.resolve(expr) {
            self.group = Some(resolved);
        }
        self
    }

    /// Set the HAVING expression and its arguments.
    pub fn having<T: Into<Value>>(
        &mut self,
        sql: &str,
        args: impl IntoIterator<Item = T>,
    ) -> &mut Self {
        let args = args.into_iter().map(Into::into).collect();
        if let Some((sql, args)) = self.raw_fragment("having", sql, args) {
            self.having = Some(sql);
            self.having_args = args;
        }
        self
    }

    pub fn order(&mut self, expr: &str) -> &mut Self {
        if let Some(resolved) = self.resolve(expr) {
            self.order = Some(resolved);
        }
        self
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.offset = Some(offset);
        self
    }

    /// Pagination helper.
    ///
    /// `page` is 1-based (clamped to >= 1).
    /// `per_page` is clamped to >= 1.
    pub fn paginate(&mut self, page: u64, per_page: u64) -> &mut Self {
        let page = page.max(1);
        let size = per_page.max(1);
        self.limit = Some(size);
        self.offset = Some((page - 1) * size);
        self
    }

    pub fn mode(&mut self, mode: FetchMode) -> &mut Self {
        self.mode = mode;
        self
    }

    // ==================== Render ====================

    fn validate(&self) -> OrmResult<()> {
        match &self.build_error {
            Some(Deferred::Config(message)) => Err(OrmError::Config(message.clone())),
            Some(Deferred::Validation(message)) => Err(OrmError::Validation(message.clone())),
            None => Ok(()),
        }
    }

    /// Join arguments, then condition arguments, then having arguments.
    pub fn arguments(&self) -> Vec<Value> {
        let mut args = Vec::with_capacity(
            self.join_args.len() + self.condition_args.len() + self.having_args.len(),
        );
        args.extend(self.join_args.iter().cloned());
        args.extend(self.condition_args.iter().cloned());
        args.extend(self.having_args.iter().cloned());
        args
    }

    /// Everything after `FROM` up to and including `HAVING`.
    fn source(&self) -> String {
        let mut sql = self.model.table().select_join().to_string();
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join);
        }
        if !self.conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.conditions.join(" AND "));
        }
        if let Some(group) = &self.group {
            sql.push_str(" GROUP BY ");
            sql.push_str(group);
        }
        if let Some(having) = &self.having {
            sql.push_str(" HAVING ");
            sql.push_str(having);
        }
        sql
    }

    fn tail(&self) -> String {
        let mut sql = String::new();
        if let Some(order) = &self.order {
            sql.push_str(" ORDER BY ");
            sql.push_str(order);
        }
        if let Some(limit) = self.model.table().dialect().render_limit(self.limit, self.offset) {
            sql.push(' ');
            sql.push_str(&limit);
        }
        sql
    }

    /// Render with a replacement select list, keeping order and limit.
    fn render_with(&self, select: &str) -> OrmResult<Statement> {
        self.validate()?;
        Ok(Statement::new(
            format!("SELECT {select} FROM {}{}", self.source(), self.tail()),
            self.arguments(),
        ))
    }

    /// Render the statement and its arguments.
    ///
    /// Rendering is pure: building twice without mutation yields the same
    /// statement.
    pub fn build(&self) -> OrmResult<Statement> {
        self.render_with(self.select.as_deref().unwrap_or("*"))
    }

    /// Render a `COUNT(*)` over the accumulated source.
    ///
    /// Grouped queries count groups through a derived table.
    pub fn build_count(&self) -> OrmResult<Statement> {
        self.validate()?;
        let sql = if self.group.is_some() {
            format!(
                "SELECT COUNT(*) AS count FROM (SELECT 1 FROM {}) AS counted",
                self.source()
            )
        } else {
            format!("SELECT COUNT(*) AS count FROM {}", self.source())
        };
        Ok(Statement::new(sql, self.arguments()))
    }

    /// Render `SELECT <function>(<column>) AS aggregate` over the source.
    fn build_aggregate(&self, function: &str, column: &str) -> OrmResult<Statement> {
        self.validate()?;
        let column = Ident::parse(column)?;
        let d = self.model.table().dialect();
        Ok(Statement::new(
            format!(
                "SELECT {function}({}) AS aggregate FROM {}",
                column.render(d),
                self.source()
            ),
            self.arguments(),
        ))
    }
}
