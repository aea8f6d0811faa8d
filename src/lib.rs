//! Compiles OData queries into single SQL statements over tables of JSON documents.
pub mod odata;
pub mod schema;
pub mod server;
pub mod sql;
