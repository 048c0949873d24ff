//! Finishers: execute the rendered query and interpret the result.

use super::{FetchMode, Query};
use crate::error::{OrmError, OrmResult};
use crate::executor::{Executor, Statement, Values, run};
use crate::ident::Ident;
use crate::record::{FromRecord, Record, key_of};
use crate::value::{FromValue, Key, Value};

impl Query {
    async fn fetch<E: Executor>(&self, exec: &E, stmt: &Statement) -> OrmResult<Vec<Values>> {
        Ok(run(exec, self.model.table().sql_log(), stmt).await?.rows)
    }

    /// Build records for `rows`, going through the identity map when the
    /// query selects whole rows in [`FetchMode::Identity`].
    fn materialize(&self, rows: Vec<Values>) -> OrmResult<Vec<Record>> {
        let identity = self.mode == FetchMode::Identity && self.whole_rows;
        let cache = self.model.table().cache();
        rows.into_iter()
            .map(|values| {
                let record = self.model.factory().build(&self.model, values)?;
                if identity {
                    if let Some(key) = record.key() {
                        if let Some(cached) = cache.retrieve(&key) {
                            return Ok(cached);
                        }
                        cache.store(&record);
                    }
                }
                Ok(record)
            })
            .collect()
    }

    /// Fetch every matching record.
    pub async fn all<E: Executor>(&self, exec: &E) -> OrmResult<Vec<Record>> {
        let stmt = self.build()?;
        let rows = self.fetch(exec, &stmt).await?;
        self.materialize(rows)
    }

    /// Fetch the first matching record (`LIMIT 1` on a copy of the query).
    pub async fn one<E: Executor>(&self, exec: &E) -> OrmResult<Option<Record>> {
        let mut first = self.clone();
        first.limit(1);
        Ok(first.all(exec).await?.into_iter().next())
    }

    /// Fetch every matching record decoded as `T`.
    pub async fn all_as<T: FromRecord, E: Executor>(&self, exec: &E) -> OrmResult<Vec<T>> {
        self.all(exec).await?.iter().map(T::from_record).collect()
    }

    pub async fn one_as<T: FromRecord, E: Executor>(&self, exec: &E) -> OrmResult<Option<T>> {
        self.one(exec).await?.as_ref().map(T::from_record).transpose()
    }

    /// Number of matching rows (of groups, for a grouped query).
    pub async fn count<E: Executor>(&self, exec: &E) -> OrmResult<u64> {
        let stmt = self.build_count()?;
        let result = run(exec, self.model.table().sql_log(), &stmt).await?;
        match result.scalar("count") {
            Some(value) => u64::from_value("count", value),
            None => Ok(0),
        }
    }

    /// Row counts per distinct value of `column`.
    ///
    /// Unlike [`count`](Self::count) this replaces any grouping with
    /// `GROUP BY <column>` and returns one `(value, count)` pair per group,
    /// in the order the database returns them.
    pub async fn count_by<E: Executor>(&self, exec: &E, column: &str) -> OrmResult<Vec<(Value, u64)>> {
        let d = self.model.table().dialect();
        let column = Ident::parse(column)?.render(d);
        let mut grouped = self.clone();
        grouped.group = Some(column.clone());
        let stmt = grouped.render_with(&format!(
            "{column} AS {}, COUNT(*) AS {}",
            d.quote_identifier("value"),
            d.quote_identifier("count")
        ))?;
        let rows = self.fetch(exec, &stmt).await?;
        rows.into_iter()
            .map(|row| {
                let value = row.get("value").cloned().unwrap_or(Value::Null);
                let count = u64::from_value("count", row.get("count").unwrap_or(&Value::Null))?;
                Ok((value, count))
            })
            .collect()
    }

    /// Whether at least one row matches.
    pub async fn exists<E: Executor>(&self, exec: &E) -> OrmResult<bool> {
        let mut probe = self.clone();
        probe.limit(1);
        let stmt = probe.render_with("1")?;
        Ok(!self.fetch(exec, &stmt).await?.is_empty())
    }

    async fn aggregate<E: Executor>(&self, exec: &E, function: &str, column: &str) -> OrmResult<Value> {
        let stmt = self.build_aggregate(function, column)?;
        let result = run(exec, self.model.table().sql_log(), &stmt).await?;
        Ok(result.scalar("aggregate").cloned().unwrap_or(Value::Null))
    }

    /// `SUM(column)`; `Null` when no row matches.
    pub async fn sum<E: Executor>(&self, exec: &E, column: &str) -> OrmResult<Value> {
        self.aggregate(exec, "SUM", column).await
    }

    pub async fn average<E: Executor>(&self, exec: &E, column: &str) -> OrmResult<Value> {
        self.aggregate(exec, "AVG", column).await
    }

    pub async fn minimum<E: Executor>(&self, exec: &E, column: &str) -> OrmResult<Value> {
        self.aggregate(exec, "MIN", column).await
    }

    pub async fn maximum<E: Executor>(&self, exec: &E, column: &str) -> OrmResult<Value> {
        self.aggregate(exec, "MAX", column).await
    }

    /// Delete every matching row through the model's table.
    ///
    /// The matching keys are selected first, then deleted child first across
    /// the inheritance chain (evicting each from the identity map). Returns
    /// the number of rows removed from the model's own table.
    pub async fn delete<E: Executor>(&self, exec: &E) -> OrmResult<u64> {
        let table = self.model.table();
        let pk = table.primary_key().columns();
        if pk.is_empty() {
            return Err(OrmError::config(format!(
                "cannot delete from '{}' by query: it has no primary key",
                table.name()
            )));
        }
        let d = table.dialect();
        let select: Vec<String> = pk
            .iter()
            .map(|c| format!("{} AS {}", table.qualify(c), d.quote_identifier(c)))
            .collect();
        let stmt = self.render_with(&select.join(", "))?;
        let keys: Vec<Key> = self
            .fetch(exec, &stmt)
            .await?
            .iter()
            .filter_map(|row| key_of(row, pk))
            .collect();
        tracing::trace!(target: "strata::write", table = %table.physical(), keys = keys.len(), "delete by query");
        table.delete_keys(exec, &keys).await
    }
}
