//! Materialized rows.
//!
//! A [`Record`] is a column-to-value mapping bound to the model that
//! produced it. Typed structs convert to and from records through
//! [`FromRecord`] and [`IntoValues`], both generated by `#[derive(Entity)]`.

use crate::error::{OrmError, OrmResult};
use crate::executor::Values;
use crate::model::Model;
use crate::relation::Lazy;
use crate::value::{FromValue, Key, Value};
use std::fmt;
use std::sync::{Arc, Weak};

/// One row, bound to its owning model.
#[derive(Debug, Clone)]
pub struct Record {
    model: Weak<Model>,
    key_columns: Arc<[String]>,
    values: Values,
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.key_columns == other.key_columns && self.values == other.values
    }
}

impl Record {
    pub(crate) fn bound(model: &Arc<Model>, values: Values) -> Self {
        Self {
            model: Arc::downgrade(model),
            key_columns: model.table().schema().primary_key().columns().into(),
            values,
        }
    }

    /// A record not bound to any model (no key, no relations).
    pub fn detached(values: Values) -> Self {
        Self::keyed(values, &[])
    }

    /// A record keyed on `key_columns` but not bound to any model.
    pub fn keyed(values: Values, key_columns: &[&str]) -> Self {
        Self {
            model: Weak::new(),
            key_columns: key_columns.iter().map(|c| c.to_string()).collect(),
            values,
        }
    }

    /// The owning model, if it is still registered.
    pub fn model(&self) -> OrmResult<Arc<Model>> {
        self.model
            .upgrade()
            .ok_or_else(|| OrmError::config("record is not bound to a live model"))
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// The value of `column`, `Null` when absent.
    pub fn value(&self, column: &str) -> &Value {
        const NULL: &Value = &Value::Null;
        self.values.get(column).unwrap_or(NULL)
    }

    /// Decode `column`; absent columns decode from `Null`.
    pub fn get_as<T: FromValue>(&self, column: &str) -> OrmResult<T> {
        T::from_value(column, self.value(column))
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.values.insert(column.into(), value.into());
        self
    }

    pub fn values(&self) -> &Values {
        &self.values
    }

    pub fn into_values(self) -> Values {
        self.values
    }

    /// Primary-key value, `None` when any part is empty.
    pub fn key(&self) -> Option<Key> {
        key_of(&self.values, &self.key_columns)
    }

    pub fn decode<T: FromRecord>(&self) -> OrmResult<T> {
        T::from_record(self)
    }
}

/// Extract the key for `columns` from `values`.
pub(crate) fn key_of(values: &Values, columns: &[String]) -> Option<Key> {
    if columns.is_empty() {
        return None;
    }
    let key = Key(
        columns
            .iter()
            .map(|c| values.get(c).cloned().unwrap_or(Value::Null))
            .collect(),
    );
    (!key.is_empty()).then_some(key)
}

/// Builds records for a model from fetched column values.
///
/// This is where validation would hook in.
pub trait RecordFactory: fmt::Debug + Send + Sync {
    fn build(&self, model: &Arc<Model>, values: Values) -> OrmResult<Record>;
}

/// Binds the values as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFactory;

impl RecordFactory for DefaultFactory {
    fn build(&self, model: &Arc<Model>, values: Values) -> OrmResult<Record> {
        Ok(Record::bound(model, values))
    }
}

/// Decode a typed value from a record.
pub trait FromRecord: Sized {
    fn from_record(record: &Record) -> OrmResult<Self>;
}

impl FromRecord for Record {
    fn from_record(record: &Record) -> OrmResult<Self> {
        Ok(record.clone())
    }
}

impl FromRecord for Values {
    fn from_record(record: &Record) -> OrmResult<Self> {
        Ok(record.values.clone())
    }
}

/// Turn a typed value into column values for writing.
pub trait IntoValues {
    fn into_values(self) -> Values;
}

impl IntoValues for Values {
    fn into_values(self) -> Values {
        self
    }
}

impl IntoValues for Record {
    fn into_values(self) -> Values {
        self.values
    }
}

impl<K: Into<String>, V: Into<Value>, const N: usize> IntoValues for [(K, V); N] {
    fn into_values(self) -> Values {
        self.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
    }
}

/// Access to the relation accessors registered on a record's model.
pub trait HasRelations {
    /// Invoke the accessor registered under `name`.
    fn relation(&self, name: &str) -> OrmResult<Lazy>;
}

impl HasRelations for Record {
    fn relation(&self, name: &str) -> OrmResult<Lazy> {
        self.model()?.relation(name, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_requires_every_part() {
        let values = [("a", Value::Int(1)), ("b", Value::Null)].into_values();
        let record = Record::keyed(values, &["a", "b"]);
        assert_eq!(record.key(), None);

        let mut record = record;
        record.set("b", "x");
        assert_eq!(
            record.key(),
            Some(Key(vec![Value::Int(1), Value::Text("x".into())]))
        );
    }

    #[test]
    fn detached_records_have_no_model() {
        let record = Record::detached(Values::new());
        assert!(record.key().is_none());
        assert!(record.model().unwrap_err().is_config());
        assert!(record.relation("author").is_err());
    }

    #[test]
    fn get_as_decodes_missing_as_null() {
        let record = Record::detached([("n", 3i64)].into_values());
        assert_eq!(record.get_as::<i64>("n").unwrap(), 3);
        assert_eq!(record.get_as::<Option<String>>("missing").unwrap(), None);
        assert!(record.get_as::<String>("missing").is_err());
    }
}
