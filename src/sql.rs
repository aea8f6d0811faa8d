pub mod ast;
mod query_builder;
pub mod variant;

pub use query_builder::{
    build_count_query, build_sql_query, Clause, QueryBuilder, QueryBuilderError, SelectNode,
    MAX_DEPTH,
};
