//! # strata
//!
//! A table-inheritance aware object mapper and SQL builder for MySQL and
//! SQLite.
//!
//! ## Features
//!
//! - **Schemas as data**: columns, indexes and primary keys declared with
//!   [`SchemaBuilder`] or derived with `#[derive(Entity)]`
//! - **Two dialects**: `CREATE TABLE` / `INSERT` / `LIMIT` rendering for
//!   MySQL and strict SQLite, failing loudly on unsupported columns
//! - **Table inheritance**: a child table shares its parent's primary key;
//!   reads join the whole chain and writes cascade across it
//! - **Fluent queries**: conditions, joins, grouping and aggregates rendered
//!   into one statement with positional arguments
//! - **Lazy relations**: belongs-to, has-many and has-many-through accessors
//!   registered per model and dispatched by name
//! - **Bring your own driver**: statements run through the [`Executor`]
//!   trait; every statement is logged with `tracing`
//!
//! ## Example
//!
//! ```ignore
//! use strata::prelude::*;
//!
//! let registry = Registry::new(Config::from_toml_str(r#"dialect = "mysql""#)?)?;
//! let entries = registry.define(ModelBuilder::new("entries", entries_schema))?;
//! let posts = registry.define(
//!     ModelBuilder::new("posts", posts_schema)
//!         .extends("entries")
//!         .belongs_to("author", "authors", "author_id"),
//! )?;
//!
//! let recent = posts
//!     .query()
//!     .filter(Conditions::new().with("status", "published").with("!category", ["draft"]))
//!     .order("created_at DESC")
//!     .limit(10)
//!     .all(&conn)
//!     .await?;
//!
//! let author = recent[0].relation("author")?.load(&conn).await?;
//! ```

pub mod cache;
pub mod config;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod ident;
pub mod model;
pub mod prelude;
pub mod query;
pub mod record;
pub mod registry;
pub mod relation;
pub mod schema;
pub mod table;
pub mod value;

#[cfg(test)]
mod test_support;

pub use cache::{MemoryCache, NoCache, RecordCache};
pub use config::Config;
pub use dialect::{Dialect, DialectKind, MySql, Sqlite};
pub use error::{DriverError, OrmError, OrmResult};
pub use executor::{Executor, PreparedStatement, ResultSet, SchemaIntrospection, Statement, Values};
pub use model::{Model, ModelBuilder};
pub use query::{Condition, Conditions, FetchMode, JoinMode, Op, Query};
pub use record::{FromRecord, HasRelations, IntoValues, Record, RecordFactory};
pub use registry::Registry;
pub use relation::{Lazy, Related, Relation, RelationDef, RelationKind};
pub use schema::{Column, Schema, SchemaBuilder, Schematic};
pub use table::Table;
pub use value::{FromValue, Key, Value};

#[cfg(feature = "derive")]
pub use strata_derive::Entity;
