use axum::{
    extract::{Path, Query, State},
    Json,
};
use axum_extra::extract::WithRejection;
use tracing::{info_span, Instrument};

use crate::{
    odata::ODataParams,
    server::{
        client::{odata_query, with_connection},
        config::AppState,
        error::ServerError,
    },
};

/// `$filter` matching the document whose key property equals `id`.
fn key_filter(key_property: &str, id: &str) -> String {
    format!("{} eq '{}'", key_property, id.replace('\'', "''"))
}

#[axum_macros::debug_handler]
pub async fn get_entity(
    State(state): State<AppState>,
    WithRejection(Path((entity, id)), _): WithRejection<Path<(String, String)>, ServerError>,
    WithRejection(Query(params), _): WithRejection<Query<ODataParams>, ServerError>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let span = info_span!("get_entity", entity = %entity, id = %id);

    // only the shape of the document can be chosen when reading by key
    let params = ODataParams {
        filter: Some(key_filter(&state.config.key_property, &id)),
        select: params.select,
        expand: params.expand,
        ..Default::default()
    };

    let documents = with_connection(&state, move |connection, graph| {
        odata_query(connection, graph, &entity, &params, false)
    })
    .instrument(span)
    .await?;

    documents
        .into_iter()
        .next()
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("No entity with key {}", id)))
}
