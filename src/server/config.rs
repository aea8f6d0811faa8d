use std::sync::{Arc, Mutex};

use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use rusqlite::Connection;
use serde::Deserialize;

use crate::{schema::SchemaGraph, sql::variant::Dialect};

use super::error::ServerError;

#[derive(Debug, Clone)]
pub struct Config {
    /// Document property compared against the key of single entity reads
    pub key_property: String,
}

/// Shared by every request. The graph is immutable once loaded.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub graph: Arc<SchemaGraph>,
    pub connection: Arc<Mutex<Connection>>,
}

impl AppState {
    pub fn new(config: Config, graph: SchemaGraph, connection: Connection) -> Self {
        Self {
            config: Arc::new(config),
            graph: Arc::new(graph),
            connection: Arc::new(Mutex::new(connection)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DialectParam {
    #[serde(default)]
    dialect: Dialect,
}

/// The sql dialect requested with `?dialect=`, sqlite when absent.
#[derive(Debug)]
pub struct RequestDialect(pub Dialect);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequestDialect {
    type Rejection = ServerError;
    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(param) = Query::<DialectParam>::from_request_parts(parts, state).await?;
        Ok(Self(param.dialect))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    #[tokio::test]
    async fn state_shares_config_and_dialect_defaults_to_sqlite() {
        let config = Config {
            key_property: "Id".to_owned(),
        };
        let state = AppState::new(
            config,
            SchemaGraph::default(),
            Connection::open_in_memory().unwrap(),
        );
        assert_eq!(state.clone().config.key_property, "Id");

        let (mut parts, _) = Request::builder().uri("/Car").body(()).unwrap().into_parts();
        let RequestDialect(dialect) = RequestDialect::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert_eq!(dialect, Dialect::Sqlite);
    }
}
