//! Dialect specific rendering of the JSON primitives the query builder relies on.
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use super::ast::{Expr, Ident};

mod postgres;
mod sqlite;

pub use postgres::Postgres;
pub use sqlite::Sqlite;

pub trait Variant: Send + Sync {
    /// Builds an object from key/value pairs, in order.
    fn json_object(&self, pairs: Vec<(String, Expr)>) -> Expr;
    fn json_array(&self, items: Vec<Expr>) -> Expr;
    /// Aggregate function collecting one value per row into an array.
    fn json_array_aggregate(&self, value: Expr) -> Expr;
    /// Table function exploding an array into one row per element, with a `value` column.
    fn json_each(&self, array: Expr) -> Expr;
    /// The element of a `json_each` row as a json value, suitable for comparisons.
    fn json_each_value(&self, alias: &Ident) -> Expr;
    fn json_extract(&self, source: Expr, path: &[String]) -> Expr;
    fn json_extract_text(&self, source: Expr, path: &[String]) -> Expr;
    /// Re-types a value as json, needed wherever a value crosses a subquery boundary.
    fn json_cast(&self, value: Expr) -> Expr;
    fn json_quote(&self, value: &str) -> Expr;
    fn json_array_length(&self, array: Expr) -> Expr;
    fn cast_to_integer(&self, value: Expr) -> Expr;
    fn cast_to_datetime(&self, value: Expr) -> Expr;
    /// `LIMIT` argument meaning "no limit", so an `OFFSET` can still follow.
    fn unbounded_limit(&self) -> Expr;
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Dialect {
    #[default]
    Sqlite,
    Postgresql,
}

impl Dialect {
    pub fn variant(self) -> &'static dyn Variant {
        match self {
            Dialect::Sqlite => &Sqlite,
            Dialect::Postgresql => &Postgres,
        }
    }
}

/// The raw `value` column of a `json_each` row.
pub fn each_value_column(alias: &Ident) -> Expr {
    Expr::CompoundIdentifier(vec![alias.clone(), Ident::unquoted("value")])
}

/// Wraps binary operations so a json operator can be applied to them.
fn operand(expr: Expr) -> Expr {
    match expr {
        Expr::BinaryOp { .. } => Expr::Nested(Box::new(expr)),
        expr => expr,
    }
}

fn is_plain_key(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
