//! Convenient imports for typical `strata` usage.
//!
//! ```ignore
//! use strata::prelude::*;
//! ```

pub use crate::{
    Conditions, Config, Executor, FetchMode, FromRecord, HasRelations, IntoValues, Key, Lazy,
    Model, ModelBuilder, Op, OrmError, OrmResult, Query, Record, Registry, Related, SchemaBuilder,
    Schematic, Value,
};

#[cfg(feature = "derive")]
pub use crate::Entity;
