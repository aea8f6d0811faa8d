//! Runs compiled OData queries against the sqlite database.
//!
//! Nothing here guards against concurrent writers. Uniqueness checks done by re-querying
//! before a write stay racy without table locking, and are left to the writing side.
use rusqlite::Connection;
use serde_json::Value;
use tracing::debug;

use crate::{
    odata::ODataParams,
    schema::SchemaGraph,
    sql::{build_count_query, build_sql_query, variant::Dialect},
};

use super::{api::error_response::ErrorResponseType, config::AppState, error::ServerError};

/// Returns the `data` document of every row matching `params`.
///
/// Reads of a single entity (`collection == false`) return at most one document.
pub fn odata_query(
    connection: &Connection,
    graph: &SchemaGraph,
    entity: &str,
    params: &ODataParams,
    collection: bool,
) -> Result<Vec<Value>, ServerError> {
    let statement = if collection {
        build_sql_query(Dialect::Sqlite.variant(), graph, entity, params)?
    } else {
        let params = ODataParams {
            top: Some(1),
            skip: None,
            ..params.clone()
        };
        build_sql_query(Dialect::Sqlite.variant(), graph, entity, &params)?
    };

    debug!(%statement, "running query");

    let mut prepared = connection.prepare(&statement)?;
    let rows = prepared.query_map([], |row| row.get::<_, Option<String>>("data"))?;

    let documents = rows
        .map(|row| -> Result<Value, ServerError> {
            match row? {
                Some(document) => Ok(serde_json::from_str(&document)?),
                None => Ok(Value::Null),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(documents)
}

pub fn odata_count(
    connection: &Connection,
    graph: &SchemaGraph,
    entity: &str,
    filter: Option<&str>,
) -> Result<i64, ServerError> {
    let statement = build_count_query(Dialect::Sqlite.variant(), graph, entity, filter)?;

    debug!(%statement, "running count query");

    Ok(connection.query_row(&statement, [], |row| row.get(0))?)
}

pub fn ping(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.query_row("SELECT 1", [], |_row| Ok(()))
}

/// Runs `f` on a blocking thread with exclusive use of the connection.
pub async fn with_connection<T, F>(state: &AppState, f: F) -> Result<T, ServerError>
where
    T: Send + 'static,
    F: FnOnce(&Connection, &SchemaGraph) -> Result<T, ServerError> + Send + 'static,
{
    let connection = state.connection.clone();
    let graph = state.graph.clone();
    tokio::task::spawn_blocking(move || {
        let connection = connection.lock().map_err(|_err| ServerError::UncaughtError {
            details: None,
            message: "The database connection is poisoned".to_owned(),
            error_type: ErrorResponseType::UncaughtError,
        })?;
        f(&connection, &graph)
    })
    .await?
}
