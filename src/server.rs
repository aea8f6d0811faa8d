pub mod api;

use axum::{routing::get, Router};

pub mod client;
pub mod config;
mod error;
mod routes;
use self::routes::*;

pub use self::config::{AppState, Config};
pub use self::error::ServerError;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/schema", get(get_schema))
        .route("/explain/:entity", get(get_explain))
        .route("/:entity", get(get_entities))
        .route("/:entity/:id", get(get_entity))
        .with_state(state)
}
