//! Join resolution.

use super::Query;
use crate::error::OrmError;
use crate::ident::validate_name;
use crate::model::Model;
use crate::value::Value;
use std::sync::Arc;

/// Join type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinMode {
    #[default]
    Inner,
    Left,
}

impl JoinMode {
    pub fn keyword(self) -> &'static str {
        match self {
            JoinMode::Inner => "INNER JOIN",
            JoinMode::Left => "LEFT JOIN",
        }
    }
}

impl Query {
    /// `INNER JOIN` another model on a shared key.
    pub fn join(&mut self, target: &Arc<Model>) -> &mut Self {
        self.join_model(JoinMode::Inner, target)
    }

    /// `LEFT JOIN` another model on a shared key.
    pub fn left_join(&mut self, target: &Arc<Model>) -> &mut Self {
        self.join_model(JoinMode::Left, target)
    }

    /// Join `target` with `USING(<key>)`.
    ///
    /// The key is the primary key of the first table in this model's chain
    /// (the model itself, then its ancestors nearest first) whose key
    /// columns all appear in the target's extended schema. No common key is
    /// a configuration error, never a cross join, and so is an alias that
    /// is already in use. A target with ancestors or implements joins in as
    /// its parenthesized inheritance join.
    ///
    /// Rows of a `SELECT *` over a join carry the target's columns, so they
    /// bypass the identity map.
    pub fn join_model(&mut self, mode: JoinMode, target: &Arc<Model>) -> &mut Self {
        let owner = self.model.table().clone();
        let target_table = target.table();

        let aliases: Vec<String> = target_table
            .chain()
            .map(|t| t.alias().to_string())
            .chain(target_table.implements().iter().map(|i| i.table.alias().to_string()))
            .collect();
        if let Some(clash) = aliases.iter().find(|a| self.alias_in_use(a)) {
            self.fail(OrmError::config(format!(
                "cannot join '{}': alias '{clash}' is already in use",
                target.id()
            )));
            return self;
        }

        let extended = target_table.extended_schema();
        let key = owner.chain().map(|t| t.primary_key().columns()).find(|columns| {
            !columns.is_empty() && extended.has_columns(columns)
        });
        let Some(key) = key else {
            self.fail(OrmError::config(format!(
                "no common key to join '{}' onto '{}'",
                target.id(),
                self.model.id()
            )));
            return self;
        };

        let d = owner.dialect();
        let using = d.quote_list(key);
        let source = if target_table.ancestors().is_empty() && target_table.implements().is_empty()
        {
            format!(
                "{} AS {}",
                target_table.quoted_physical(),
                target_table.quoted_alias()
            )
        } else {
            target_table.join_source()
        };
        self.joins
            .push(format!("{} {source} USING({using})", mode.keyword()));
        self.join_aliases.extend(aliases);
        self.joined();
        self
    }

    /// Join a subquery as `(<subquery>) AS <alias> ON <on>`.
    ///
    /// The subquery's arguments go to the join bucket, after those of
    /// earlier joins.
    pub fn join_query(&mut self, mode: JoinMode, query: &Query, alias: &str, on: &str) -> &mut Self {
        if let Err(e) = validate_name(alias) {
            self.fail(e);
            return self;
        }
        if self.alias_in_use(alias) {
            self.fail(OrmError::config(format!(
                "cannot join subquery: alias '{alias}' is already in use"
            )));
            return self;
        }
        let sub = match query.build() {
            Ok(sub) => sub,
            Err(e) => {
                self.fail(e);
                return self;
            }
        };
        let Some(on) = self.resolve(on) else {
            return self;
        };
        self.join_aliases.push(alias.to_string());
        let alias = self.model.table().dialect().quote_identifier(alias);
        self.joins
            .push(format!("{} ({}) AS {alias} ON {on}", mode.keyword(), sub.sql));
        self.join_args.extend(sub.args);
        self.joined();
        self
    }

    /// Whether `alias` names a table of the owner's join or an earlier join.
    fn alias_in_use(&self, alias: &str) -> bool {
        let owner = self.model.table();
        owner.chain().any(|t| t.alias() == alias)
            || owner.implements().iter().any(|i| i.table.alias() == alias)
            || self.join_aliases.iter().any(|a| a == alias)
    }

    /// Append an already rendered, argument-free join.
    pub(crate) fn push_join(&mut self, sql: String) -> &mut Self {
        self.joins.push(sql);
        self
    }

    /// Append a raw join fragment with `?` placeholders.
    pub fn join_raw<T: Into<Value>>(
        &mut self,
        sql: &str,
        args: impl IntoIterator<Item = T>,
    ) -> &mut Self {
        let args = args.into_iter().map(Into::into).collect();
        if let Some((sql, args)) = self.raw_fragment("join", sql, args) {
            self.joins.push(sql);
            self.join_args.extend(args);
            self.joined();
        }
        self
    }
}
