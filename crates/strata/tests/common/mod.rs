//! Shared helpers for integration tests.
//!
//! [`Recorder`] stands in for a database driver: it captures every
//! executed statement with its arguments and answers from a queue of
//! canned result sets (one affected row when the queue is empty).

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use strata::{
    DriverError, Executor, PreparedStatement, ResultSet, SchemaIntrospection, Statement, Value,
    Values,
};

#[derive(Debug, Default)]
struct Shared {
    executed: Mutex<Vec<Statement>>,
    replies: Mutex<VecDeque<ResultSet>>,
    tables: Mutex<HashSet<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct Recorder {
    shared: Arc<Shared>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, set: ResultSet) -> &Self {
        self.shared.replies.lock().unwrap().push_back(set);
        self
    }

    pub fn reply_rows(&self, rows: Vec<Values>) -> &Self {
        self.reply(ResultSet::with_rows(rows))
    }

    pub fn existing_table(&self, name: &str) -> &Self {
        self.shared.tables.lock().unwrap().insert(name.to_string());
        self
    }

    pub fn statements(&self) -> Vec<Statement> {
        self.shared.executed.lock().unwrap().clone()
    }

    pub fn sql(&self) -> Vec<String> {
        self.statements().into_iter().map(|s| s.sql).collect()
    }

    pub fn last(&self) -> Statement {
        self.statements().pop().expect("no statement executed")
    }
}

pub fn row<const N: usize>(pairs: [(&str, Value); N]) -> Values {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

#[derive(Debug)]
pub struct Prepared {
    sql: String,
    shared: Arc<Shared>,
}

impl PreparedStatement for Prepared {
    async fn execute(&self, args: &[Value]) -> Result<ResultSet, DriverError> {
        self.shared
            .executed
            .lock()
            .unwrap()
            .push(Statement::new(self.sql.clone(), args.to_vec()));
        let reply = self.shared.replies.lock().unwrap().pop_front();
        Ok(reply.unwrap_or_else(|| ResultSet::with_affected(1)))
    }
}

impl Executor for Recorder {
    type Statement = Prepared;

    async fn prepare(&self, sql: &str) -> Result<Prepared, DriverError> {
        Ok(Prepared {
            sql: sql.to_string(),
            shared: self.shared.clone(),
        })
    }
}

impl SchemaIntrospection for Recorder {
    async fn table_exists(&self, name: &str) -> Result<bool, DriverError> {
        Ok(self.shared.tables.lock().unwrap().contains(name))
    }
}
