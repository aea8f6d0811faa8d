use axum::{extract::State, Json};

use crate::{schema::SchemaGraph, server::config::AppState};

#[axum_macros::debug_handler]
pub async fn get_schema(State(state): State<AppState>) -> Json<SchemaGraph> {
    Json(state.graph.as_ref().clone())
}
