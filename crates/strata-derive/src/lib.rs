//! Derive macros for strata
//!
//! Provides `#[derive(Entity)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod attrs;
mod entity;
mod types;

/// Derive `Schematic`, `FromRecord` and `IntoValues` for a struct.
///
/// # Example
///
/// ```ignore
/// use strata::Entity;
///
/// #[derive(Entity)]
/// #[orm(table = "posts")]
/// struct Post {
///     #[orm(serial)]
///     id: Option<u64>,
///     #[orm(varchar = 200, index)]
///     title: String,
///     #[orm(foreign)]
///     author_id: u64,
///     #[orm(column = "body_text", text)]
///     body: Option<String>,
///     #[orm(skip)]
///     draft_notes: String,
/// }
/// ```
///
/// # Attributes
///
/// Struct level:
/// - `#[orm(table = "name")]` - Table name (defaults to the snake_case type name)
///
/// Field level:
/// - `#[orm(column = "name")]` - Map field to a different column name
/// - `serial`, `foreign`, `text`, `blob`, `date`, `time`, `datetime`, `timestamp`,
///   `varchar = N`, `char = N`, `decimal(P, S)` - Column kind (otherwise inferred
///   from the field type)
/// - `primary`, `unique`, `nullable`, `auto_increment` - Column constraints
/// - `default = <literal>`, `default_current_timestamp`
/// - `index`, `unique_index` - Single-column index
/// - `skip` - Not a column; filled with `Default::default()` when decoding
///
/// `Option<T>` fields are nullable.
#[proc_macro_derive(Entity, attributes(orm))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    entity::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
