//! Write path across an inheritance chain.
//!
//! Inserts run most-ancestral first so the root table mints the shared key.
//! Updates use one multi-table `UPDATE` where the dialect allows it and
//! otherwise cascade parent-first, one statement per table. Deletes remove
//! the child row first, then each ancestor. Each write eliminates the
//! affected key from every cache along the chain before running.

use super::Table;
use crate::error::{OrmError, OrmResult};
use crate::executor::{Executor, SchemaIntrospection, Statement, Values, run};
use crate::record::key_of;
use crate::value::{Key, Value};

fn partial(written: &[String], table: &Table, err: OrmError) -> OrmError {
    if written.is_empty() {
        err
    } else {
        OrmError::PartialWrite {
            written: written.to_vec(),
            table: table.physical.clone(),
            source: Box::new(err),
        }
    }
}

impl Table {
    fn eliminate(&self, key: &Key) {
        for table in self.chain() {
            table.cache.eliminate(key);
        }
    }

    /// `<col> = ? AND ...` over the primary key, optionally alias-qualified.
    fn key_predicate(&self, qualified: bool) -> String {
        let d = self.dialect.as_ref();
        self.primary_key()
            .columns()
            .iter()
            .map(|c| {
                if qualified {
                    format!("{}.{} = ?", self.quoted_alias(), d.quote_identifier(c))
                } else {
                    format!("{} = ?", d.quote_identifier(c))
                }
            })
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    /// Predicate matching any of `keys`, with its arguments.
    fn keys_predicate(&self, keys: &[Key]) -> (String, Vec<Value>) {
        let args: Vec<Value> = keys
            .iter()
            .flat_map(|k| k.values().iter().cloned().map(Value::normalized))
            .collect();
        let columns = self.primary_key().columns();
        let sql = if keys.len() == 1 {
            self.key_predicate(false)
        } else if let [column] = columns {
            let marks = vec!["?"; keys.len()];
            format!(
                "{} IN({})",
                self.dialect.quote_identifier(column),
                marks.join(", ")
            )
        } else {
            let one = format!("({})", self.key_predicate(false));
            vec![one; keys.len()].join(" OR ")
        };
        (sql, args)
    }

    /// Insert a row into every table of the chain and return its key.
    ///
    /// Columns not declared by a table are ignored for that table. When the
    /// key is not supplied, the first (most-ancestral) insert must mint it
    /// through `last_insert_id`. Keyless tables return an empty key.
    pub async fn insert<E: Executor>(&self, exec: &E, values: &Values) -> OrmResult<Key> {
        let pk = self.primary_key().columns();
        let mut key = key_of(values, pk);
        if let Some(key) = &key {
            self.eliminate(key);
        }

        let mut written: Vec<String> = Vec::new();
        for table in self.chain().rev() {
            let mut columns: Vec<&str> = Vec::new();
            let mut args = Vec::new();
            for column in table.schema.columns() {
                let name = column.name.as_str();
                let value = match (&key, pk.iter().position(|c| c == name)) {
                    (Some(key), Some(i)) => key.values().get(i),
                    _ => values.get(name),
                };
                if let Some(value) = value {
                    columns.push(name);
                    args.push(value.clone().normalized());
                }
            }
            let stmt = Statement::new(
                self.dialect.render_insert(&table.physical, &columns),
                args,
            );
            let result = run(exec, &self.log, &stmt)
                .await
                .map_err(|e| partial(&written, table, e))?;

            if key.is_none() && !pk.is_empty() {
                let minted = match (pk.len(), result.last_insert_id) {
                    (1, Some(id)) if !id.is_empty() => Key(vec![id]),
                    _ => {
                        // The row exists but cannot be addressed; report it as written.
                        written.push(table.physical.clone());
                        let err = OrmError::validation(format!(
                            "insert into '{}' did not produce a primary key",
                            table.physical
                        ));
                        return Err(partial(&written, table, err));
                    }
                };
                key = Some(minted);
            }
            tracing::trace!(target: "strata::write", table = %table.physical, "inserted");
            written.push(table.physical.clone());
        }
        Ok(key.unwrap_or(Key(Vec::new())))
    }

    /// Update the row addressed by the primary key found in `values`.
    ///
    /// Returns the number of affected rows reported by the driver (summed
    /// across statements when the write cascades).
    pub async fn update<E: Executor>(&self, exec: &E, values: &Values) -> OrmResult<u64> {
        let pk = self.primary_key().columns();
        let key = key_of(values, pk).ok_or_else(|| {
            OrmError::validation(format!(
                "update on '{}' requires a primary key value",
                self.name
            ))
        })?;
        self.eliminate(&key);
        let key_args = key.values().iter().cloned().map(Value::normalized);
        let d = self.dialect.as_ref();

        if self.ancestors.is_empty() || d.supports_multi_table_update() {
            let qualified = !self.ancestors.is_empty();
            let mut assignments = Vec::new();
            let mut args = Vec::new();
            for table in self.chain() {
                for column in table.schema.columns() {
                    if pk.contains(&column.name) {
                        continue;
                    }
                    let Some(value) = values.get(&column.name) else {
                        continue;
                    };
                    let target = if qualified {
                        format!(
                            "{}.{}",
                            table.quoted_alias(),
                            d.quote_identifier(&column.name)
                        )
                    } else {
                        d.quote_identifier(&column.name)
                    };
                    assignments.push(format!("{target} = ?"));
                    args.push(value.clone().normalized());
                }
            }
            if assignments.is_empty() {
                return Ok(0);
            }
            let target = if qualified {
                format!("{} {}{}", self.quoted_physical(), self.quoted_alias(), self.update_join)
            } else {
                self.quoted_physical()
            };
            args.extend(key_args);
            let stmt = Statement::new(
                format!(
                    "UPDATE {target} SET {} WHERE {}",
                    assignments.join(", "),
                    self.key_predicate(qualified)
                ),
                args,
            );
            return Ok(run(exec, &self.log, &stmt).await?.affected_rows);
        }

        let key_args: Vec<Value> = key_args.collect();
        let mut written: Vec<String> = Vec::new();
        let mut affected = 0;
        for table in self.chain().rev() {
            let mut assignments = Vec::new();
            let mut args = Vec::new();
            for column in table.schema.columns() {
                if pk.contains(&column.name) {
                    continue;
                }
                if let Some(value) = values.get(&column.name) {
                    assignments.push(format!("{} = ?", d.quote_identifier(&column.name)));
                    args.push(value.clone().normalized());
                }
            }
            if assignments.is_empty() {
                continue;
            }
            args.extend(key_args.iter().cloned());
            let stmt = Statement::new(
                format!(
                    "UPDATE {} SET {} WHERE {}",
                    table.quoted_physical(),
                    assignments.join(", "),
                    table.key_predicate(false)
                ),
                args,
            );
            let result = run(exec, &self.log, &stmt)
                .await
                .map_err(|e| partial(&written, table, e))?;
            tracing::trace!(target: "strata::write", table = %table.physical, "cascaded update");
            affected += result.affected_rows;
            written.push(table.physical.clone());
        }
        Ok(affected)
    }

    /// Delete one row from every table of the chain, child first.
    pub async fn delete<E: Executor>(&self, exec: &E, key: &Key) -> OrmResult<u64> {
        self.delete_keys(exec, std::slice::from_ref(key)).await
    }

    /// Delete every row addressed by `keys`, child first. Returns the
    /// number of rows removed from this (the most derived) table.
    pub async fn delete_keys<E: Executor>(&self, exec: &E, keys: &[Key]) -> OrmResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let width = self.primary_key().columns().len();
        if width == 0 {
            return Err(OrmError::config(format!(
                "cannot delete by key from '{}' which has no primary key",
                self.name
            )));
        }
        if let Some(bad) = keys.iter().find(|k| k.values().len() != width || k.is_empty()) {
            return Err(OrmError::validation(format!(
                "key {bad:?} does not address a row of '{}'",
                self.name
            )));
        }
        for key in keys {
            self.eliminate(key);
        }

        let (predicate, args) = self.keys_predicate(keys);
        let mut written: Vec<String> = Vec::new();
        let mut affected = None;
        for table in self.chain() {
            let stmt = Statement::new(
                format!("DELETE FROM {} WHERE {predicate}", table.quoted_physical()),
                args.clone(),
            );
            let result = run(exec, &self.log, &stmt)
                .await
                .map_err(|e| partial(&written, table, e))?;
            tracing::trace!(target: "strata::write", table = %table.physical, "deleted");
            affected.get_or_insert(result.affected_rows);
            written.push(table.physical.clone());
        }
        Ok(affected.unwrap_or(0))
    }

    /// Update when `values` carries a non-empty primary key, insert otherwise.
    pub async fn save<E: Executor>(&self, exec: &E, values: &Values) -> OrmResult<Key> {
        match key_of(values, self.primary_key().columns()) {
            Some(key) => {
                self.update(exec, values).await?;
                Ok(key)
            }
            None => self.insert(exec, values).await,
        }
    }

    /// Create this table and its indexes unless it already exists.
    ///
    /// Returns whether anything was created. Ancestors are not installed.
    pub async fn install<E>(&self, exec: &E) -> OrmResult<bool>
    where
        E: Executor + SchemaIntrospection,
    {
        if self.exists(exec).await? {
            return Ok(false);
        }
        let d = self.dialect.as_ref();
        let create = d.render_create_table(&self.physical, &self.schema)?;
        run(exec, &self.log, &Statement::new(create, Vec::new())).await?;
        for index in self.schema.indexes() {
            let sql = d.render_create_index(&self.physical, index);
            run(exec, &self.log, &Statement::new(sql, Vec::new())).await?;
        }
        tracing::debug!(target: "strata::schema", table = %self.physical, "installed");
        Ok(true)
    }

    /// Drop this table if it exists. Returns whether it was dropped.
    pub async fn uninstall<E>(&self, exec: &E) -> OrmResult<bool>
    where
        E: Executor + SchemaIntrospection,
    {
        if !self.exists(exec).await? {
            return Ok(false);
        }
        let sql = self.dialect.render_drop_table(&self.physical);
        run(exec, &self.log, &Statement::new(sql, Vec::new())).await?;
        tracing::debug!(target: "strata::schema", table = %self.physical, "uninstalled");
        Ok(true)
    }

    async fn exists<E: SchemaIntrospection>(&self, exec: &E) -> OrmResult<bool> {
        exec.table_exists(&self.physical).await.map_err(|e| {
            OrmError::Other(format!(
                "schema introspection failed for '{}': {e}",
                self.physical
            ))
        })
    }
}
