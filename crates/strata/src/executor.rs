//! Statement execution collaborators.
//!
//! strata never talks to a database directly. Drivers implement
//! [`Executor`] (prepare) and [`PreparedStatement`] (execute), and
//! optionally [`SchemaIntrospection`] for `install`/`uninstall`. Every
//! statement the crate issues goes through [`run`], which wraps driver
//! failures with the statement text (and, for execute failures, the bound
//! arguments) and emits a `tracing` event on the `strata::sql` target.

use crate::error::{DriverError, OrmError, OrmResult};
use crate::value::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::{Duration, Instant};

/// One result row: column name to value.
pub type Values = BTreeMap<String, Value>;

/// A rendered statement and its positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }
}

/// What a driver hands back for one executed statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub rows: Vec<Values>,
    pub affected_rows: u64,
    /// Key minted by an auto-increment insert.
    pub last_insert_id: Option<Value>,
}

impl ResultSet {
    pub fn with_rows(rows: Vec<Values>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    pub fn with_affected(affected_rows: u64) -> Self {
        Self {
            affected_rows,
            ..Self::default()
        }
    }

    pub fn with_insert_id(id: impl Into<Value>) -> Self {
        Self {
            affected_rows: 1,
            last_insert_id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Value of `column` in the first row.
    pub fn scalar(&self, column: &str) -> Option<&Value> {
        self.rows.first().and_then(|row| row.get(column))
    }
}

/// A statement accepted by the driver, ready to be executed with arguments.
pub trait PreparedStatement: Send + Sync {
    fn execute(
        &self,
        args: &[Value],
    ) -> impl Future<Output = Result<ResultSet, DriverError>> + Send;
}

/// A database connection (or anything that can prepare statements).
///
/// The crate never executes raw text without preparing it first.
pub trait Executor: Send + Sync {
    type Statement: PreparedStatement;

    fn prepare(
        &self,
        sql: &str,
    ) -> impl Future<Output = Result<Self::Statement, DriverError>> + Send;
}

/// Catalog lookups used by `install` / `uninstall`.
pub trait SchemaIntrospection: Send + Sync {
    fn table_exists(&self, name: &str) -> impl Future<Output = Result<bool, DriverError>> + Send;
}

/// The type of SQL statement being run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Other,
}

impl StatementKind {
    /// Classify by leading keyword (ignoring whitespace and opening parentheses).
    pub fn from_sql(sql: &str) -> Self {
        let trimmed = sql.trim_start_matches(|c: char| c.is_whitespace() || c == '(');
        let starts = |keyword: &str| {
            trimmed
                .get(0..keyword.len())
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(keyword))
        };
        if starts("SELECT") {
            StatementKind::Select
        } else if starts("INSERT") {
            StatementKind::Insert
        } else if starts("UPDATE") {
            StatementKind::Update
        } else if starts("DELETE") {
            StatementKind::Delete
        } else {
            StatementKind::Other
        }
    }
}

/// Statement logging settings, derived from [`Config`](crate::config::Config).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlLog {
    /// Truncate logged SQL to this many bytes.
    pub max_len: usize,
    /// Statements slower than this are logged at `WARN`.
    pub slow: Duration,
}

impl Default for SqlLog {
    fn default() -> Self {
        Self {
            max_len: 200,
            slow: Duration::from_millis(500),
        }
    }
}

impl SqlLog {
    fn truncate<'a>(&self, sql: &'a str) -> std::borrow::Cow<'a, str> {
        if sql.len() <= self.max_len {
            return sql.into();
        }
        let mut end = self.max_len;
        while end > 0 && !sql.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &sql[..end]).into()
    }
}

/// Prepare and execute `stmt`, wrapping failures and logging the outcome.
pub async fn run<E: Executor>(exec: &E, log: &SqlLog, stmt: &Statement) -> OrmResult<ResultSet> {
    let kind = StatementKind::from_sql(&stmt.sql);
    let started = Instant::now();

    let prepared = match exec.prepare(&stmt.sql).await {
        Ok(prepared) => prepared,
        Err(source) => {
            tracing::warn!(
                target: "strata::sql",
                kind = ?kind,
                sql = %log.truncate(&stmt.sql),
                error = %source,
                "prepare failed"
            );
            return Err(OrmError::Prepare {
                sql: stmt.sql.clone(),
                source,
            });
        }
    };

    let result = prepared.execute(&stmt.args).await;
    let elapsed = started.elapsed();
    let elapsed_ms = elapsed.as_secs_f64() * 1000.0;

    match result {
        Ok(set) => {
            if elapsed > log.slow {
                tracing::warn!(
                    target: "strata::sql",
                    kind = ?kind,
                    args = stmt.args.len(),
                    elapsed_ms,
                    sql = %log.truncate(&stmt.sql),
                    "slow statement"
                );
            } else {
                tracing::debug!(
                    target: "strata::sql",
                    kind = ?kind,
                    args = stmt.args.len(),
                    rows = set.rows.len(),
                    affected = set.affected_rows,
                    elapsed_ms,
                    sql = %log.truncate(&stmt.sql),
                );
            }
            Ok(set)
        }
        Err(source) => {
            tracing::warn!(
                target: "strata::sql",
                kind = ?kind,
                args = stmt.args.len(),
                elapsed_ms,
                sql = %log.truncate(&stmt.sql),
                error = %source,
                "execute failed"
            );
            Err(OrmError::Execute {
                sql: stmt.sql.clone(),
                args: stmt.args.clone(),
                source,
            })
        }
    }
}
