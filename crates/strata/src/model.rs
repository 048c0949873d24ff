//! Models: a table plus its relations and record behavior.
//!
//! A [`Model`] is built by a [`Registry`](crate::registry::Registry) from a
//! [`ModelBuilder`] and shared as `Arc<Model>`. It hands out fresh
//! [`Query`] instances, materializes [`Record`]s through its
//! [`RecordFactory`] and dispatches relation accessors by name.

use crate::cache::RecordCache;
use crate::error::{OrmError, OrmResult};
use crate::executor::{Executor, SchemaIntrospection};
use crate::query::Query;
use crate::record::{DefaultFactory, IntoValues, Record, RecordFactory};
use crate::relation::{Accessor, Lazy, Relation, RelationDef, RelationKind};
use crate::schema::{Schema, SchemaBuilder, Schematic};
use crate::table::Table;
use crate::value::Key;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A table bound to relations and record behavior.
pub struct Model {
    id: String,
    table: Arc<Table>,
    relations: Vec<Arc<Relation>>,
    accessors: HashMap<String, Accessor>,
    /// Belongs-to relations by target model id.
    belongs_to: HashMap<String, Vec<Arc<Relation>>>,
    factory: Arc<dyn RecordFactory>,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("id", &self.id)
            .field("table", &self.table.physical())
            .field(
                "relations",
                &self.relations.iter().map(|r| r.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl Model {
    pub(crate) fn from_parts(
        id: String,
        table: Arc<Table>,
        relations: Vec<Arc<Relation>>,
        custom: Vec<(String, Accessor)>,
        factory: Arc<dyn RecordFactory>,
    ) -> Self {
        let mut accessors: HashMap<String, Accessor> = HashMap::new();
        let mut belongs_to: HashMap<String, Vec<Arc<Relation>>> = HashMap::new();
        for relation in &relations {
            let captured = relation.clone();
            accessors.insert(
                relation.name().to_string(),
                Arc::new(move |model: &Model, record: &Record| captured.access(model, record)),
            );
            if relation.kind() == RelationKind::BelongsTo {
                belongs_to
                    .entry(relation.target().to_string())
                    .or_default()
                    .push(relation.clone());
            }
        }
        accessors.extend(custom);
        Self {
            id,
            table,
            relations,
            accessors,
            belongs_to,
            factory,
        }
    }

    /// Registry identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }

    /// Own columns merged with every ancestor's.
    pub fn schema(&self) -> &Schema {
        self.table.extended_schema()
    }

    pub fn factory(&self) -> &dyn RecordFactory {
        self.factory.as_ref()
    }

    pub fn cache(&self) -> &dyn RecordCache {
        self.table.cache()
    }

    /// Declared relations, in declaration order.
    pub fn relations(&self) -> &[Arc<Relation>] {
        &self.relations
    }

    pub fn relation_named(&self, name: &str) -> Option<&Arc<Relation>> {
        self.relations.iter().find(|r| r.name() == name)
    }

    /// Names of every registered accessor, sorted.
    pub fn accessor_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.accessors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// The single belongs-to relation pointing at model `target`.
    ///
    /// None, or more than one, is a configuration error.
    pub fn belongs_to_target(&self, target: &str) -> OrmResult<&Arc<Relation>> {
        match self.belongs_to.get(target).map(Vec::as_slice) {
            Some([relation]) => Ok(relation),
            Some(many) if many.len() > 1 => {
                let names: Vec<&str> = many.iter().map(|r| r.name()).collect();
                Err(OrmError::config(format!(
                    "'{}' has more than one relation to '{target}' ({}); the pivot is ambiguous",
                    self.id,
                    names.join(", ")
                )))
            }
            _ => Err(OrmError::config(format!(
                "'{}' has no belongs-to relation to '{target}'",
                self.id
            ))),
        }
    }

    /// Invoke the accessor registered under `name` for `record`.
    pub fn relation(&self, name: &str, record: &Record) -> OrmResult<Lazy> {
        let accessor = self.accessors.get(name).ok_or_else(|| {
            OrmError::config(format!("model '{}' has no relation '{name}'", self.id))
        })?;
        accessor(self, record)
    }

    /// A fresh query over this model.
    pub fn query(self: &Arc<Self>) -> Query {
        Query::new(self.clone())
    }

    /// Build a record bound to this model through its factory.
    pub fn record(self: &Arc<Self>, values: impl IntoValues) -> OrmResult<Record> {
        self.factory.build(self, values.into_values())
    }

    fn check_key(&self, key: &Key) -> OrmResult<()> {
        let width = self.table.primary_key().columns().len();
        if width == 0 {
            return Err(OrmError::config(format!(
                "model '{}' has no primary key",
                self.id
            )));
        }
        if key.values().len() != width {
            return Err(OrmError::validation(format!(
                "model '{}' is keyed on {width} column(s), got {}",
                self.id,
                key.values().len()
            )));
        }
        Ok(())
    }

    /// Look a row up by primary key, consulting the identity map first.
    pub async fn find<E: Executor>(
        self: &Arc<Self>,
        exec: &E,
        key: impl Into<Key>,
    ) -> OrmResult<Option<Record>> {
        let key = key.into();
        self.check_key(&key)?;
        if key.is_empty() {
            return Ok(None);
        }
        if let Some(record) = self.table.cache().retrieve(&key) {
            tracing::trace!(target: "strata::cache", model = %self.id, key = %key.cache_key(), "hit");
            return Ok(Some(record));
        }
        let mut query = self.query();
        for (column, value) in self.table.primary_key().columns().iter().zip(key.0) {
            query.where_eq(&self.table.column_path(column), value);
        }
        query.one(exec).await
    }

    /// Like [`find`](Self::find), but a missing row is [`OrmError::NotFound`].
    pub async fn get<E: Executor>(
        self: &Arc<Self>,
        exec: &E,
        key: impl Into<Key>,
    ) -> OrmResult<Record> {
        let key = key.into();
        let label = key.cache_key();
        self.find(exec, key).await?.ok_or_else(|| {
            OrmError::not_found(format!("no '{}' row with key {label}", self.id))
        })
    }

    pub async fn insert<E: Executor>(&self, exec: &E, values: impl IntoValues) -> OrmResult<Key> {
        self.table.insert(exec, &values.into_values()).await
    }

    pub async fn update<E: Executor>(&self, exec: &E, values: impl IntoValues) -> OrmResult<u64> {
        self.table.update(exec, &values.into_values()).await
    }

    pub async fn save<E: Executor>(&self, exec: &E, values: impl IntoValues) -> OrmResult<Key> {
        self.table.save(exec, &values.into_values()).await
    }

    pub async fn delete<E: Executor>(&self, exec: &E, key: impl Into<Key>) -> OrmResult<u64> {
        let key = key.into();
        self.check_key(&key)?;
        self.table.delete(exec, &key).await
    }

    pub async fn install<E: Executor + SchemaIntrospection>(&self, exec: &E) -> OrmResult<bool> {
        self.table.install(exec).await
    }

    pub async fn uninstall<E: Executor + SchemaIntrospection>(&self, exec: &E) -> OrmResult<bool> {
        self.table.uninstall(exec).await
    }
}

/// Declarative description of a model, turned into a [`Model`] by
/// [`Registry::define`](crate::registry::Registry::define).
///
/// ```
/// use strata::model::ModelBuilder;
/// use strata::schema::SchemaBuilder;
///
/// let mut posts = SchemaBuilder::new();
/// posts.add_foreign("id").primary();
/// posts.add_foreign("author_id").nullable();
///
/// let builder = ModelBuilder::new("posts", posts.build())
///     .table("blog_posts")
///     .extends("entries")
///     .belongs_to("author", "authors", "author_id")
///     .has_many("comments", "comments", "post_id");
/// assert_eq!(builder.id(), "posts");
/// ```
pub struct ModelBuilder {
    pub(crate) id: String,
    pub(crate) table: String,
    pub(crate) schema: Schema,
    pub(crate) alias: Option<String>,
    pub(crate) extends: Option<String>,
    pub(crate) implements: Vec<(String, bool)>,
    pub(crate) relations: Vec<RelationDef>,
    pub(crate) accessors: Vec<(String, Accessor)>,
    pub(crate) cache: Option<Arc<dyn RecordCache>>,
    pub(crate) factory: Arc<dyn RecordFactory>,
}

impl fmt::Debug for ModelBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelBuilder")
            .field("id", &self.id)
            .field("table", &self.table)
            .field("extends", &self.extends)
            .field("relations", &self.relations)
            .finish_non_exhaustive()
    }
}

impl ModelBuilder {
    /// A model named `id`, stored in a table of the same name.
    pub fn new(id: impl Into<String>, schema: Schema) -> Self {
        let id = id.into();
        Self {
            table: id.clone(),
            id,
            schema,
            alias: None,
            extends: None,
            implements: Vec::new(),
            relations: Vec::new(),
            accessors: Vec::new(),
            cache: None,
            factory: Arc::new(DefaultFactory),
        }
    }

    /// A model for a record type carrying [`Schematic`] metadata, named
    /// after its table.
    pub fn entity<T: Schematic>() -> OrmResult<Self> {
        Ok(Self::new(T::TABLE, SchemaBuilder::of::<T>()?))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Unprefixed table name (defaults to the model id).
    pub fn table(mut self, name: impl Into<String>) -> Self {
        self.table = name.into();
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Inherit from the model registered as `parent`.
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.extends = Some(parent.into());
        self
    }

    /// Always join the table of model `other` into reads.
    pub fn implements(mut self, other: impl Into<String>, loose: bool) -> Self {
        self.implements.push((other.into(), loose));
        self
    }

    pub fn relation(mut self, def: RelationDef) -> Self {
        self.relations.push(def);
        self
    }

    pub fn belongs_to(
        self,
        name: impl Into<String>,
        target: impl Into<String>,
        local_key: impl Into<String>,
    ) -> Self {
        self.relation(RelationDef::belongs_to(name, target, local_key))
    }

    pub fn has_many(
        self,
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        self.relation(RelationDef::has_many(name, target, foreign_key))
    }

    pub fn has_many_through(
        self,
        name: impl Into<String>,
        target: impl Into<String>,
        pivot: impl Into<String>,
    ) -> Self {
        self.relation(RelationDef::has_many_through(name, target, pivot))
    }

    /// Register a custom accessor, dispatched like a relation.
    pub fn accessor<F>(mut self, name: impl Into<String>, accessor: F) -> Self
    where
        F: Fn(&Model, &Record) -> OrmResult<Lazy> + Send + Sync + 'static,
    {
        self.accessors.push((name.into(), Arc::new(accessor)));
        self
    }

    /// Use `cache` as this model's identity map instead of the registry default.
    pub fn cache(mut self, cache: Arc<dyn RecordCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn factory(mut self, factory: Arc<dyn RecordFactory>) -> Self {
        self.factory = factory;
        self
    }
}
