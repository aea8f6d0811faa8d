//! Parsing of OData query options (`$filter`, `$orderby`, `$select`, `$expand`).
pub mod ast;
mod parser;

use serde::Deserialize;

use self::ast::{Expression, OrderByItem, QueryItem};
use self::parser::query_string;

pub type ParseError = peg::error::ParseError<peg::str::LineCol>;

pub fn parse_filter(input: &str) -> Result<Expression, ParseError> {
    query_string::filter(input)
}

pub fn parse_orderby(input: &str) -> Result<Vec<OrderByItem>, ParseError> {
    query_string::orderby(input)
}

pub fn parse_select(input: &str) -> Result<Vec<QueryItem>, ParseError> {
    query_string::query_items(input)
}

pub fn parse_expand(input: &str) -> Result<Vec<QueryItem>, ParseError> {
    query_string::query_items(input)
}

/// The OData system query options of a request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ODataParams {
    #[serde(rename = "$filter")]
    pub filter: Option<String>,
    #[serde(rename = "$select")]
    pub select: Option<String>,
    #[serde(rename = "$expand")]
    pub expand: Option<String>,
    #[serde(rename = "$orderby")]
    pub orderby: Option<String>,
    #[serde(rename = "$top")]
    pub top: Option<u64>,
    #[serde(rename = "$skip")]
    pub skip: Option<u64>,
    #[serde(rename = "$count")]
    pub count: Option<bool>,
}
