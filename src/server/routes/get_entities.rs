use axum::{
    extract::{Path, Query, State},
    Json,
};
use axum_extra::extract::WithRejection;
use tracing::{info_span, Instrument};

use crate::{
    odata::ODataParams,
    server::{
        api::entity_response::EntitySetResponse,
        client::{odata_count, odata_query, with_connection},
        config::AppState,
        error::ServerError,
    },
};

#[axum_macros::debug_handler]
pub async fn get_entities(
    State(state): State<AppState>,
    WithRejection(Path(entity), _): WithRejection<Path<String>, ServerError>,
    WithRejection(Query(params), _): WithRejection<Query<ODataParams>, ServerError>,
) -> Result<Json<EntitySetResponse>, ServerError> {
    let span = info_span!("get_entities", entity = %entity);

    let response = with_connection(&state, move |connection, graph| {
        let value = odata_query(connection, graph, &entity, &params, true)?;
        let count = if params.count.unwrap_or(false) {
            Some(odata_count(
                connection,
                graph,
                &entity,
                params.filter.as_deref(),
            )?)
        } else {
            None
        };
        Ok(EntitySetResponse { value, count })
    })
    .instrument(span)
    .await?;

    Ok(Json(response))
}
