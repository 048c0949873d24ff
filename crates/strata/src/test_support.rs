//! Recording executor for unit tests.

use crate::error::DriverError;
use crate::executor::{
    Executor, PreparedStatement, ResultSet, SchemaIntrospection, Statement, Values,
};
use crate::value::Value;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

#[derive(Debug)]
pub(crate) enum Reply {
    Ok(ResultSet),
    Err(&'static str),
}

#[derive(Debug, Default)]
struct Inner {
    executed: Mutex<Vec<Statement>>,
    replies: Mutex<VecDeque<Reply>>,
    tables: Mutex<HashSet<String>>,
}

/// Captures every executed `(sql, args)` and replays queued replies.
/// With no reply queued, a statement affects one row.
#[derive(Debug, Clone, Default)]
pub(crate) struct Recorder {
    inner: Arc<Inner>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, set: ResultSet) -> &Self {
        self.inner.replies.lock().unwrap().push_back(Reply::Ok(set));
        self
    }

    pub fn reply_rows(&self, rows: Vec<Values>) -> &Self {
        self.reply(ResultSet::with_rows(rows))
    }

    pub fn fail(&self, message: &'static str) -> &Self {
        self.inner.replies.lock().unwrap().push_back(Reply::Err(message));
        self
    }

    pub fn with_table(&self, name: &str) -> &Self {
        self.inner.tables.lock().unwrap().insert(name.to_string());
        self
    }

    pub fn statements(&self) -> Vec<Statement> {
        self.inner.executed.lock().unwrap().clone()
    }

    pub fn sql(&self) -> Vec<String> {
        self.statements().into_iter().map(|s| s.sql).collect()
    }

    pub fn last(&self) -> Statement {
        self.statements().pop().expect("no statement executed")
    }
}

pub(crate) fn row<const N: usize>(pairs: [(&str, Value); N]) -> Values {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

#[derive(Debug)]
pub(crate) struct RecordedStatement {
    sql: String,
    inner: Arc<Inner>,
}

impl PreparedStatement for RecordedStatement {
    async fn execute(&self, args: &[Value]) -> Result<ResultSet, DriverError> {
        self.inner
            .executed
            .lock()
            .unwrap()
            .push(Statement::new(self.sql.clone(), args.to_vec()));
        let reply = self.inner.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Ok(set)) => Ok(set),
            Some(Reply::Err(message)) => Err(message.into()),
            None => Ok(ResultSet::with_affected(1)),
        }
    }
}

impl Executor for Recorder {
    type Statement = RecordedStatement;

    async fn prepare(&self, sql: &str) -> Result<RecordedStatement, DriverError> {
        Ok(RecordedStatement {
            sql: sql.to_string(),
            inner: self.inner.clone(),
        })
    }
}

impl SchemaIntrospection for Recorder {
    async fn table_exists(&self, name: &str) -> Result<bool, DriverError> {
        Ok(self.inner.tables.lock().unwrap().contains(name))
    }
}
