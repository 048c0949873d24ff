//! Model registry.
//!
//! The [`Registry`] owns every [`Model`] by identifier and builds tables
//! from its [`Config`]: the active dialect, the table prefix, the default
//! identity map and statement logging. Relations resolve their targets
//! through it lazily, so models may be defined in any order as long as a
//! parent is defined before the models extending it.
//!
//! ```
//! use strata::config::Config;
//! use strata::model::ModelBuilder;
//! use strata::registry::Registry;
//! use strata::schema::SchemaBuilder;
//!
//! let registry = Registry::new(Config::new().with_table_prefix("app_"))?;
//!
//! let mut authors = SchemaBuilder::new();
//! authors.add_serial("id");
//! authors.add_varchar("name", 80);
//! registry.define(ModelBuilder::new("authors", authors.build()))?;
//!
//! let mut posts = SchemaBuilder::new();
//! posts.add_serial("id");
//! posts.add_foreign("author_id");
//! let posts = registry.define(
//!     ModelBuilder::new("posts", posts.build()).belongs_to("author", "authors", "author_id"),
//! )?;
//!
//! assert_eq!(posts.table().physical(), "app_posts");
//! registry.validate()?;
//! # Ok::<(), strata::OrmError>(())
//! ```

use crate::cache::{MemoryCache, NoCache, RecordCache};
use crate::config::Config;
use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::executor::{Executor, SchemaIntrospection};
use crate::ident::validate_name;
use crate::model::{Model, ModelBuilder};
use crate::relation::{Relation, RelationKind};
use crate::schema::Schematic;
use crate::table::Table;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub(crate) struct RegistryInner {
    config: Config,
    dialect: Arc<dyn Dialect>,
    models: RwLock<Models>,
}

#[derive(Default)]
struct Models {
    by_id: HashMap<String, Arc<Model>>,
    /// Definition order.
    order: Vec<String>,
}

impl RegistryInner {
    fn read(&self) -> RwLockReadGuard<'_, Models> {
        self.models.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Models> {
        self.models.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn lookup(&self, id: &str) -> Option<Arc<Model>> {
        self.read().by_id.get(id).cloned()
    }
}

/// Models by identifier, sharing one configuration.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.inner.config)
            .field("models", &self.inner.read().order)
            .finish()
    }
}

impl Registry {
    pub fn new(config: Config) -> OrmResult<Self> {
        config.validate()?;
        let dialect = config.dialect.dialect();
        tracing::debug!(
            target: "strata::registry",
            dialect = dialect.name(),
            prefix = %config.table_prefix,
            cache = config.cache,
            "registry created"
        );
        Ok(Self {
            inner: Arc::new(RegistryInner {
                config,
                dialect,
                models: RwLock::new(Models::default()),
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.inner.dialect.as_ref()
    }

    /// Build and register a model.
    ///
    /// Fails with a configuration error when the id is taken, the parent or
    /// an implemented model is not registered yet, a relation name repeats,
    /// or a relation key column is not declared.
    pub fn define(&self, builder: ModelBuilder) -> OrmResult<Arc<Model>> {
        validate_name(&builder.id)?;
        if self.inner.lookup(&builder.id).is_some() {
            return Err(OrmError::config(format!(
                "model '{}' is already defined",
                builder.id
            )));
        }

        let config = &self.inner.config;
        let cache: Arc<dyn RecordCache> = match builder.cache {
            Some(cache) => cache,
            None if config.cache => Arc::new(MemoryCache::default()),
            None => Arc::new(NoCache),
        };
        let mut table = Table::builder(builder.table, builder.schema, self.inner.dialect.clone())
            .prefix(config.table_prefix.clone())
            .sql_log(config.sql_log())
            .cache(cache);
        if let Some(alias) = builder.alias {
            table = table.alias(alias);
        }
        if let Some(parent) = &builder.extends {
            table = table.parent(self.required(parent, &builder.id)?.table().clone());
        }
        for (other, loose) in &builder.implements {
            table = table.implements(self.required(other, &builder.id)?.table().clone(), *loose);
        }
        let table = Arc::new(table.build()?);

        let mut names = HashSet::new();
        let mut relations = Vec::with_capacity(builder.relations.len());
        for def in builder.relations {
            validate_name(&def.name)?;
            if !names.insert(def.name.clone()) {
                return Err(OrmError::config(format!(
                    "model '{}' declares relation '{}' twice",
                    builder.id, def.name
                )));
            }
            let local_key = match (&def.local_key, def.kind, table.primary_key().columns()) {
                (Some(column), _, _) => column.clone(),
                (None, RelationKind::BelongsTo, _) => {
                    return Err(OrmError::config(format!(
                        "belongs-to relation '{}' of '{}' has no local key",
                        def.name, builder.id
                    )));
                }
                (None, _, [pk]) => pk.clone(),
                (None, _, _) => {
                    return Err(OrmError::config(format!(
                        "relation '{}' of '{}' needs an explicit local key: no single-column primary key",
                        def.name, builder.id
                    )));
                }
            };
            if !table.extended_schema().has_column(&local_key) {
                return Err(OrmError::config(format!(
                    "relation '{}' of '{}' uses undeclared column '{local_key}'",
                    def.name, builder.id
                )));
            }
            relations.push(Arc::new(Relation::new(
                def,
                builder.id.clone(),
                local_key,
                Arc::downgrade(&self.inner),
            )));
        }
        if let Some((name, _)) = builder.accessors.iter().find(|(name, _)| names.contains(name)) {
            return Err(OrmError::config(format!(
                "accessor '{name}' of '{}' clashes with a relation",
                builder.id
            )));
        }

        let model = Arc::new(Model::from_parts(
            builder.id.clone(),
            table,
            relations,
            builder.accessors,
            builder.factory,
        ));
        let mut models = self.inner.write();
        if models.by_id.contains_key(&builder.id) {
            return Err(OrmError::config(format!(
                "model '{}' is already defined",
                builder.id
            )));
        }
        models.by_id.insert(builder.id.clone(), model.clone());
        models.order.push(builder.id.clone());
        tracing::debug!(
            target: "strata::registry",
            model = %builder.id,
            table = %model.table().physical(),
            relations = model.relations().len(),
            "model defined"
        );
        Ok(model)
    }

    /// Define the model of a record type carrying [`Schematic`] metadata.
    pub fn define_entity<T: Schematic>(&self) -> OrmResult<Arc<Model>> {
        self.define(ModelBuilder::entity::<T>()?)
    }

    fn required(&self, id: &str, by: &str) -> OrmResult<Arc<Model>> {
        self.inner.lookup(id).ok_or_else(|| {
            OrmError::config(format!(
                "model '{by}' refers to '{id}', which is not defined yet"
            ))
        })
    }

    pub fn model(&self, id: &str) -> OrmResult<Arc<Model>> {
        self.inner
            .lookup(id)
            .ok_or_else(|| OrmError::config(format!("unknown model '{id}'")))
    }

    /// Every model, in definition order.
    pub fn models(&self) -> Vec<Arc<Model>> {
        let models = self.inner.read();
        models
            .order
            .iter()
            .filter_map(|id| models.by_id.get(id).cloned())
            .collect()
    }

    /// Resolve every relation now, failing on the first unknown target,
    /// unknown column or ambiguous pivot.
    pub fn validate(&self) -> OrmResult<()> {
        for model in self.models() {
            for relation in model.relations() {
                relation.validate()?;
            }
        }
        Ok(())
    }

    /// Install every model's table in definition order (parents first).
    ///
    /// Returns the physical names of the tables created.
    pub async fn install<E>(&self, exec: &E) -> OrmResult<Vec<String>>
    where
        E: Executor + SchemaIntrospection,
    {
        let mut created = Vec::new();
        for model in self.models() {
            if model.install(exec).await? {
                created.push(model.table().physical().to_string());
            }
        }
        Ok(created)
    }

    /// Drop every model's table in reverse definition order.
    pub async fn uninstall<E>(&self, exec: &E) -> OrmResult<Vec<String>>
    where
        E: Executor + SchemaIntrospection,
    {
        let mut dropped = Vec::new();
        for model in self.models().into_iter().rev() {
            if model.uninstall(exec).await? {
                dropped.push(model.table().physical().to_string());
            }
        }
        Ok(dropped)
    }
}
