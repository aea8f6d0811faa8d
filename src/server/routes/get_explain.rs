use axum::{
    extract::{Path, Query, State},
    Json,
};
use axum_extra::extract::WithRejection;
use tracing::debug;

use crate::{
    odata::ODataParams,
    server::{
        api::explain_response::ExplainResponse, config::AppState, config::RequestDialect,
        error::ServerError,
    },
    sql::QueryBuilder,
};

/// Compiles the query options without running them.
#[axum_macros::debug_handler]
pub async fn get_explain(
    State(state): State<AppState>,
    WithRejection(Path(entity), _): WithRejection<Path<String>, ServerError>,
    RequestDialect(dialect): RequestDialect,
    WithRejection(Query(params), _): WithRejection<Query<ODataParams>, ServerError>,
) -> Result<Json<ExplainResponse>, ServerError> {
    let builder = QueryBuilder::new(dialect.variant(), &state.graph);

    let query = builder.build_sql_query(&entity, &params)?;
    let count_query = builder.build_count_query(&entity, params.filter.as_deref())?;

    debug!(%dialect, %query, "explained query");

    Ok(Json(ExplainResponse { query, count_query }))
}
