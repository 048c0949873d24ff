//! Query condition primitives.
//!
//! [`Op`] and [`Condition`] build single WHERE fragments; [`Conditions`]
//! is the ordered `{column: value}` mapping accepted by
//! [`Query::filter`](super::Query::filter), where a `!` prefix on the
//! column negates the comparison and a list value becomes `IN(...)`.

use crate::dialect::Dialect;
use crate::error::OrmResult;
use crate::ident::Ident;
use crate::value::Value;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// Negation marker accepted in front of a column name.
pub const NEGATION: char = '!';

/// Query operator for building conditions.
///
/// # Example
/// ```
/// use strata::query::Op;
///
/// Op::eq("value");
/// Op::gte(100);
/// Op::like("%pattern%");
/// Op::in_list([1, 2, 3]);
/// Op::between(10, 20);
/// Op::is_null();
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Equal: column = value
    Eq(Value),
    /// Not equal: column != value
    Ne(Value),
    /// Greater than: column > value
    Gt(Value),
    /// Greater than or equal: column >= value
    Gte(Value),
    /// Less than: column < value
    Lt(Value),
    /// Less than or equal: column <= value
    Lte(Value),
    /// LIKE pattern match
    Like(Value),
    /// NOT LIKE pattern match
    NotLike(Value),
    /// IS NULL
    IsNull,
    /// IS NOT NULL
    IsNotNull,
    /// IN (list), rendered with inlined literals
    In(Vec<Value>),
    /// NOT IN (list), rendered with inlined literals
    NotIn(Vec<Value>),
    /// BETWEEN a AND b
    Between(Value, Value),
}

impl Op {
    pub fn eq(val: impl Into<Value>) -> Self {
        Op::Eq(val.into())
    }

    pub fn ne(val: impl Into<Value>) -> Self {
        Op::Ne(val.into())
    }

    pub fn gt(val: impl Into<Value>) -> Self {
        Op::Gt(val.into())
    }

    pub fn gte(val: impl Into<Value>) -> Self {
        Op::Gte(val.into())
    }

    pub fn lt(val: impl Into<Value>) -> Self {
        Op::Lt(val.into())
    }

    pub fn lte(val: impl Into<Value>) -> Self {
        Op::Lte(val.into())
    }

    pub fn like(val: impl Into<Value>) -> Self {
        Op::Like(val.into())
    }

    pub fn not_like(val: impl Into<Value>) -> Self {
        Op::NotLike(val.into())
    }

    pub fn is_null() -> Self {
        Op::IsNull
    }

    pub fn is_not_null() -> Self {
        Op::IsNotNull
    }

    pub fn in_list<T: Into<Value>>(vals: impl IntoIterator<Item = T>) -> Self {
        Op::In(vals.into_iter().map(Into::into).collect())
    }

    pub fn not_in<T: Into<Value>>(vals: impl IntoIterator<Item = T>) -> Self {
        Op::NotIn(vals.into_iter().map(Into::into).collect())
    }

    pub fn between(from: impl Into<Value>, to: impl Into<Value>) -> Self {
        Op::Between(from.into(), to.into())
    }

    /// The logical complement, where one exists (`BETWEEN` has none and is
    /// returned unchanged).
    pub fn negate(self) -> Self {
        match self {
            Op::Eq(v) => Op::Ne(v),
            Op::Ne(v) => Op::Eq(v),
            Op::Gt(v) => Op::Lte(v),
            Op::Gte(v) => Op::Lt(v),
            Op::Lt(v) => Op::Gte(v),
            Op::Lte(v) => Op::Gt(v),
            Op::Like(v) => Op::NotLike(v),
            Op::NotLike(v) => Op::Like(v),
            Op::IsNull => Op::IsNotNull,
            Op::IsNotNull => Op::IsNull,
            Op::In(v) => Op::NotIn(v),
            Op::NotIn(v) => Op::In(v),
            between @ Op::Between(..) => between,
        }
    }
}

/// The right-hand side of a `{column: value}` condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    Value(Value),
    List(Vec<Value>),
}

impl Criterion {
    /// `Null` becomes `IS NULL`, a list becomes `IN`, anything else `=`.
    pub fn into_op(self, negate: bool) -> Op {
        let op = match self {
            Criterion::Value(Value::Null) => Op::IsNull,
            Criterion::Value(v) => Op::Eq(v),
            Criterion::List(vs) => Op::In(vs),
        };
        if negate { op.negate() } else { op }
    }
}

/// Conversion into a [`Criterion`].
///
/// Implemented for scalar values and for lists (`Vec<T>`, arrays) of them.
/// `Vec<u8>` is a single bytes value, not a list.
pub trait IntoCriterion {
    fn into_criterion(self) -> Criterion;
}

impl IntoCriterion for Criterion {
    fn into_criterion(self) -> Criterion {
        self
    }
}

impl<T: Into<Value>, const N: usize> IntoCriterion for [T; N] {
    fn into_criterion(self) -> Criterion {
        Criterion::List(self.into_iter().map(Into::into).collect())
    }
}

impl IntoCriterion for Vec<u8> {
    fn into_criterion(self) -> Criterion {
        Criterion::Value(Value::Bytes(self))
    }
}

impl<T: Into<Value>> IntoCriterion for Option<T> {
    fn into_criterion(self) -> Criterion {
        Criterion::Value(self.into())
    }
}

macro_rules! criterion_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoCriterion for $ty {
                fn into_criterion(self) -> Criterion {
                    Criterion::Value(self.into())
                }
            }

            impl IntoCriterion for Vec<$ty> {
                fn into_criterion(self) -> Criterion {
                    Criterion::List(self.into_iter().map(Into::into).collect())
                }
            }
        )*
    };
}

criterion_scalar!(
    Value,
    bool,
    i8,
    i16,
    i32,
    i64,
    u16,
    u32,
    u64,
    f32,
    f64,
    String,
    &str,
    &String,
    NaiveDate,
    NaiveTime,
    NaiveDateTime,
    DateTime<Utc>,
);

impl IntoCriterion for u8 {
    fn into_criterion(self) -> Criterion {
        Criterion::Value(self.into())
    }
}

/// Ordered `{column: criterion}` mapping.
///
/// ```
/// use strata::query::Conditions;
///
/// let conditions = Conditions::new()
///     .with("status", "published")
///     .with("!category", ["draft", "spam"])
///     .with("deleted_at", None::<String>);
/// assert_eq!(conditions.len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conditions {
    entries: Vec<(String, Criterion)>,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, criterion: impl IntoCriterion) -> Self {
        self.push(column, criterion);
        self
    }

    pub fn push(&mut self, column: impl Into<String>, criterion: impl IntoCriterion) -> &mut Self {
        self.entries.push((column.into(), criterion.into_criterion()));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Criterion)> {
        self.entries.iter().map(|(k, c)| (k.as_str(), c))
    }
}

impl IntoIterator for Conditions {
    type Item = (String, Criterion);
    type IntoIter = std::vec::IntoIter<(String, Criterion)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// A single WHERE fragment over a validated (possibly dotted) column.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    column: Ident,
    op: Op,
}

impl Condition {
    pub fn new(column: &str, op: Op) -> OrmResult<Self> {
        Ok(Self {
            column: Ident::parse(column)?,
            op,
        })
    }

    /// Interpret one `{column: criterion}` entry, honoring the `!` prefix.
    pub fn parse(key: &str, criterion: Criterion) -> OrmResult<Self> {
        let (column, negate) = match key.strip_prefix(NEGATION) {
            Some(rest) => (rest.trim_start(), true),
            None => (key, false),
        };
        Self::new(column, criterion.into_op(negate))
    }

    pub fn column(&self) -> &Ident {
        &self.column
    }

    pub fn op(&self) -> &Op {
        &self.op
    }

    /// Render the fragment, appending bound values (date/time values
    /// normalized) to `args`. List members are inlined as literals.
    pub fn build(&self, dialect: &dyn Dialect, args: &mut Vec<Value>) -> String {
        let col = self.column.render(dialect);
        let mut bind = |operator: &str, value: &Value| {
            args.push(value.clone().normalized());
            format!("{col} {operator} ?")
        };
        match &self.op {
            Op::Eq(v) => bind("=", v),
            Op::Ne(v) => bind("!=", v),
            Op::Gt(v) => bind(">", v),
            Op::Gte(v) => bind(">=", v),
            Op::Lt(v) => bind("<", v),
            Op::Lte(v) => bind("<=", v),
            Op::Like(v) => bind("LIKE", v),
            Op::NotLike(v) => bind("NOT LIKE", v),
            Op::IsNull => format!("{col} IS NULL"),
            Op::IsNotNull => format!("{col} IS NOT NULL"),
            Op::In(vals) | Op::NotIn(vals) => {
                let negated = matches!(self.op, Op::NotIn(_));
                if vals.is_empty() {
                    // Empty IN list - always false / true
                    return if negated { "1=1" } else { "1=0" }.to_string();
                }
                let literals: Vec<String> =
                    vals.iter().map(|v| dialect.quote_literal(v)).collect();
                let operator = if negated { "NOT IN" } else { "IN" };
                format!("{col} {operator}({})", literals.join(","))
            }
            Op::Between(from, to) => {
                args.push(from.clone().normalized());
                args.push(to.clone().normalized());
                format!("{col} BETWEEN ? AND ?")
            }
        }
    }
}
