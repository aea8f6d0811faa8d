use axum::{extract::State, http::StatusCode, response::IntoResponse};

use crate::server::{
    client::{ping, with_connection},
    config::AppState,
};

#[axum_macros::debug_handler]
pub async fn get_health(State(state): State<AppState>) -> impl IntoResponse {
    let healthy = with_connection(&state, |connection, _graph| Ok(ping(connection)?)).await;

    if healthy.is_ok() {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::GATEWAY_TIMEOUT
    }
}
