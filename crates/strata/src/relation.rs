//! Relations between models and their lazy accessors.
//!
//! A [`Relation`] is declared on its owning model at build time and names
//! its target by model identifier. The target is looked up in the registry
//! the first time it is needed and memoized, so models may reference each
//! other in any definition order.
//!
//! Invoking an accessor on a record never runs a statement. It returns a
//! [`Lazy`] describing how to load the related rows; [`Lazy::load`] runs it.

use crate::error::{OrmError, OrmResult};
use crate::executor::Executor;
use crate::model::Model;
use crate::query::Query;
use crate::record::Record;
use crate::registry::RegistryInner;
use crate::value::{Key, Value};
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

/// Cardinality of a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// The owner holds the key of one target row.
    BelongsTo,
    /// Target rows hold the owner's key.
    HasMany,
    /// Target rows are linked to the owner through a pivot model.
    HasManyThrough,
}

/// Declaration of a relation, before its owner is built.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationDef {
    pub(crate) kind: RelationKind,
    pub(crate) name: String,
    pub(crate) target: String,
    pub(crate) local_key: Option<String>,
    pub(crate) foreign_key: Option<String>,
    pub(crate) through: Option<String>,
}

impl RelationDef {
    /// The owner's `local_key` column holds the target's key.
    pub fn belongs_to(
        name: impl Into<String>,
        target: impl Into<String>,
        local_key: impl Into<String>,
    ) -> Self {
        Self {
            kind: RelationKind::BelongsTo,
            name: name.into(),
            target: target.into(),
            local_key: Some(local_key.into()),
            foreign_key: None,
            through: None,
        }
    }

    /// The target's `foreign_key` column holds the owner's key.
    pub fn has_many(
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            kind: RelationKind::HasMany,
            name: name.into(),
            target: target.into(),
            local_key: None,
            foreign_key: Some(foreign_key.into()),
            through: None,
        }
    }

    /// Target rows reached through the belongs-to relations of `pivot`.
    pub fn has_many_through(
        name: impl Into<String>,
        target: impl Into<String>,
        pivot: impl Into<String>,
    ) -> Self {
        Self {
            kind: RelationKind::HasManyThrough,
            name: name.into(),
            target: target.into(),
            local_key: None,
            foreign_key: None,
            through: Some(pivot.into()),
        }
    }

    /// Override the owner-side column (defaults to the owner's primary key
    /// for has-many relations).
    pub fn local_key(mut self, column: impl Into<String>) -> Self {
        self.local_key = Some(column.into());
        self
    }

    /// Override the target-side column of a belongs-to relation (defaults
    /// to the target's primary key).
    pub fn foreign_key(mut self, column: impl Into<String>) -> Self {
        self.foreign_key = Some(column.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> RelationKind {
        self.kind
    }
}

/// A built relation. Immutable apart from the memoized target lookup.
pub struct Relation {
    kind: RelationKind,
    name: String,
    owner: String,
    target: String,
    local_key: String,
    foreign_key: Option<String>,
    through: Option<String>,
    registry: Weak<RegistryInner>,
    resolved: OnceLock<Weak<Model>>,
}

impl fmt::Debug for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relation")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("owner", &self.owner)
            .field("target", &self.target)
            .field("local_key", &self.local_key)
            .field("foreign_key", &self.foreign_key)
            .field("through", &self.through)
            .finish_non_exhaustive()
    }
}

impl Relation {
    pub(crate) fn new(
        def: RelationDef,
        owner: String,
        local_key: String,
        registry: Weak<RegistryInner>,
    ) -> Self {
        Self {
            kind: def.kind,
            name: def.name,
            owner,
            target: def.target,
            local_key,
            foreign_key: def.foreign_key,
            through: def.through,
            registry,
            resolved: OnceLock::new(),
        }
    }

    pub fn kind(&self) -> RelationKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identifier of the owning model.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Identifier of the related model.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn local_key(&self) -> &str {
        &self.local_key
    }

    /// Declared target-side column, when one was given.
    pub fn foreign_key(&self) -> Option<&str> {
        self.foreign_key.as_deref()
    }

    /// Identifier of the pivot model of a has-many-through relation.
    pub fn through(&self) -> Option<&str> {
        self.through.as_deref()
    }

    fn lookup(&self, id: &str) -> OrmResult<Arc<Model>> {
        let registry = self
            .registry
            .upgrade()
            .ok_or_else(|| OrmError::config("the registry owning this relation was dropped"))?;
        registry.lookup(id).ok_or_else(|| {
            OrmError::config(format!(
                "relation '{}' of '{}' refers to unknown model '{id}'",
                self.name, self.owner
            ))
        })
    }

    /// The related model, resolved once and memoized.
    pub fn target_model(&self) -> OrmResult<Arc<Model>> {
        if let Some(model) = self.resolved.get().and_then(Weak::upgrade) {
            return Ok(model);
        }
        let model = self.lookup(&self.target)?;
        let _ = self.resolved.set(Arc::downgrade(&model));
        tracing::trace!(
            target: "strata::relation",
            relation = %self.name,
            owner = %self.owner,
            target = %self.target,
            "resolved relation target"
        );
        Ok(model)
    }

    /// Target-side column: the declared foreign key, else the target's
    /// single-column primary key.
    fn target_column(&self, target: &Model) -> OrmResult<String> {
        let column = match (&self.foreign_key, target.table().primary_key().columns()) {
            (Some(column), _) => column.clone(),
            (None, [pk]) => pk.clone(),
            (None, _) => {
                return Err(OrmError::config(format!(
                    "relation '{}' needs an explicit foreign key: '{}' has no single-column primary key",
                    self.name, self.target
                )));
            }
        };
        if !target.table().extended_schema().has_column(&column) {
            return Err(OrmError::config(format!(
                "relation '{}' refers to unknown column '{column}' of '{}'",
                self.name, self.target
            )));
        }
        Ok(column)
    }

    /// Check that everything this relation refers to exists and is
    /// unambiguous.
    pub fn validate(&self) -> OrmResult<()> {
        let target = self.target_model()?;
        match self.kind {
            RelationKind::BelongsTo | RelationKind::HasMany => {
                self.target_column(&target)?;
            }
            RelationKind::HasManyThrough => {
                let owner = self.lookup(&self.owner)?;
                self.through_parts(&owner, &target)?;
            }
        }
        Ok(())
    }

    /// Build the lazy accessor result for `record`, a row of `owner`.
    pub fn access(&self, owner: &Model, record: &Record) -> OrmResult<Lazy> {
        let value = record.value(&self.local_key).clone();
        match self.kind {
            RelationKind::BelongsTo => {
                if value.is_empty() {
                    let nullable = owner
                        .table()
                        .extended_schema()
                        .column(&self.local_key)
                        .is_some_and(|c| c.nullable);
                    if nullable {
                        return Ok(Lazy::Missing);
                    }
                    return Err(OrmError::relation_integrity(&self.name, &self.local_key));
                }
                let model = self.target_model()?;
                let column = self.target_column(&model)?;
                Ok(Lazy::Find { model, column, value })
            }
            RelationKind::HasMany => {
                if value.is_empty() {
                    return Ok(Lazy::Missing);
                }
                let target = self.target_model()?;
                let column = self.target_column(&target)?;
                let mut query = target.query();
                query.where_eq(&target.table().column_path(&column), value);
                Ok(Lazy::Many(query))
            }
            RelationKind::HasManyThrough => {
                if value.is_empty() {
                    return Ok(Lazy::Missing);
                }
                let target = self.target_model()?;
                let (back, forward, pivot) = self.through_parts(owner, &target)?;
                let back_column = back.target_column(owner)?;
                let forward_column = forward.target_column(&target)?;

                let (o, p, t) = (owner.table(), pivot.table(), target.table());
                let join = format!(
                    "INNER JOIN {} ON {} = {} INNER JOIN {} ON {} = {}",
                    p.join_source(),
                    p.qualify(&forward.local_key),
                    t.qualify(&forward_column),
                    o.join_source(),
                    o.qualify(&back_column),
                    p.qualify(&back.local_key),
                );
                let mut query = target.query();
                query
                    .select_model_columns()
                    .push_join(join)
                    .where_eq(&o.column_path(&self.local_key), value);
                Ok(Lazy::Many(query))
            }
        }
    }

    /// The pivot model with its belongs-to relations back to the owner and
    /// on to the target.
    fn through_parts(
        &self,
        owner: &Model,
        target: &Model,
    ) -> OrmResult<(Arc<Relation>, Arc<Relation>, Arc<Model>)> {
        let pivot_id = self.through.as_deref().ok_or_else(|| {
            OrmError::config(format!("relation '{}' has no pivot model", self.name))
        })?;
        if owner.id() == target.id() {
            return Err(OrmError::config(format!(
                "relation '{}' is ambiguous: '{pivot_id}' cannot tell the owner side from the target side of '{}'",
                self.name,
                owner.id()
            )));
        }
        let pivot = self.lookup(pivot_id)?;
        let back = pivot.belongs_to_target(owner.id())?.clone();
        let forward = pivot.belongs_to_target(target.id())?.clone();

        let aliases = [owner.table().alias(), pivot.table().alias(), target.table().alias()];
        if aliases[0] == aliases[1] || aliases[1] == aliases[2] || aliases[0] == aliases[2] {
            return Err(OrmError::config(format!(
                "relation '{}' joins tables sharing an alias: {aliases:?}",
                self.name
            )));
        }
        Ok((back, forward, pivot))
    }
}

/// A relation accessor registered on a model under its name.
pub type Accessor = Arc<dyn Fn(&Model, &Record) -> OrmResult<Lazy> + Send + Sync>;

/// Deferred relation lookup returned by accessors.
#[derive(Debug, Clone)]
pub enum Lazy {
    /// Nothing to load (an empty, nullable key).
    Missing,
    /// One target row where `column = value`.
    Find {
        model: Arc<Model>,
        column: String,
        value: Value,
    },
    /// Every row of the query.
    Many(Query),
}

impl Lazy {
    pub fn is_missing(&self) -> bool {
        matches!(self, Lazy::Missing)
    }

    /// The pending query of a to-many relation.
    pub fn query(&self) -> Option<&Query> {
        match self {
            Lazy::Many(query) => Some(query),
            _ => None,
        }
    }

    /// Run the lookup. A `Find` on the target's primary key goes through
    /// the target's identity map first.
    pub async fn load<E: Executor>(self, exec: &E) -> OrmResult<Related> {
        match self {
            Lazy::Missing => Ok(Related::None),
            Lazy::Find {
                model,
                column,
                value,
            } => {
                let by_key = matches!(
                    model.table().primary_key().columns(),
                    [pk] if *pk == column
                );
                let found = if by_key {
                    model.find(exec, Key(vec![value])).await?
                } else {
                    let mut query = model.query();
                    query.where_eq(&model.table().column_path(&column), value);
                    query.one(exec).await?
                };
                Ok(found.map_or(Related::None, Related::One))
            }
            Lazy::Many(query) => Ok(Related::Many(query.all(exec).await?)),
        }
    }
}

/// The loaded side of a relation.
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    None,
    One(Record),
    Many(Vec<Record>),
}

impl Related {
    pub fn into_one(self) -> Option<Record> {
        match self {
            Related::One(record) => Some(record),
            Related::Many(records) => records.into_iter().next(),
            Related::None => None,
        }
    }

    pub fn into_many(self) -> Vec<Record> {
        match self {
            Related::None => Vec::new(),
            Related::One(record) => vec![record],
            Related::Many(records) => records,
        }
    }
}
