//! SQL identifier handling.
//!
//! [`Ident`] represents a possibly dotted identifier (`alias.column`) whose
//! parts have been validated. Quoting is left to the active
//! [`Dialect`](crate::dialect::Dialect), so the same identifier renders as
//! `` `post`.`title` `` for MySQL and `"post"."title"` for SQLite.
//!
//! - Bare parts are validated against: `[A-Za-z_][A-Za-z0-9_$]*`
//! - A part may be `*` only in last position (`post.*`)

use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};

/// A validated, possibly dotted SQL identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    parts: Vec<String>,
}

impl Ident {
    /// Parse `name` or `qualifier.name`.
    pub fn parse(s: &str) -> OrmResult<Self> {
        if s.is_empty() {
            return Err(OrmError::validation("Identifier cannot be empty"));
        }

        let raw: Vec<&str> = s.split('.').collect();
        let last = raw.len() - 1;
        let mut parts = Vec::with_capacity(raw.len());
        for (i, part) in raw.into_iter().enumerate() {
            if part == "*" && i == last && i > 0 {
                parts.push(part.to_string());
                continue;
            }
            validate_name(part).map_err(|_| {
                OrmError::validation(format!("Invalid identifier '{s}'"))
            })?;
            parts.push(part.to_string());
        }
        Ok(Self { parts })
    }

    /// The last (unqualified) part.
    pub fn name(&self) -> &str {
        self.parts.last().map(String::as_str).unwrap_or_default()
    }

    /// The qualifier, when the identifier is dotted.
    pub fn qualifier(&self) -> Option<&str> {
        if self.parts.len() > 1 {
            self.parts.get(self.parts.len() - 2).map(String::as_str)
        } else {
            None
        }
    }

    /// Render the identifier with the dialect's quoting.
    pub fn render(&self, dialect: &dyn Dialect) -> String {
        self.parts
            .iter()
            .map(|p| {
                if p == "*" {
                    p.clone()
                } else {
                    dialect.quote_identifier(p)
                }
            })
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// Validate a single, undotted identifier.
pub fn validate_name(name: &str) -> OrmResult<()> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(OrmError::validation("Identifier cannot be empty"));
    };
    if !(first == '_' || first.is_ascii_alphabetic()) {
        return Err(OrmError::validation(format!(
            "Invalid identifier start character in '{name}'"
        )));
    }
    if let Some(c) = chars.find(|c| !(*c == '_' || *c == '$' || c.is_ascii_alphanumeric())) {
        return Err(OrmError::validation(format!(
            "Invalid character '{c}' in identifier '{name}'"
        )));
    }
    Ok(())
}
