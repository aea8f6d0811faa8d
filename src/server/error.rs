use axum::{
    extract::rejection::{PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tokio::task::JoinError;
use tracing::error;

use crate::sql::QueryBuilderError;

use super::api::error_response::{ErrorResponse, ErrorResponseType};

#[derive(Debug)]
pub enum ServerError {
    NotFound(String),
    UncaughtError {
        details: Option<serde_json::Value>,
        message: String,
        error_type: ErrorResponseType,
    },
}

impl ServerError {
    fn bad_request(message: String, details: Option<serde_json::Value>) -> Self {
        Self::UncaughtError {
            details,
            message,
            error_type: ErrorResponseType::BadRequest,
        }
    }
    fn internal(message: String) -> Self {
        Self::UncaughtError {
            details: None,
            message,
            error_type: ErrorResponseType::UncaughtError,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        match self {
            Self::UncaughtError {
                details,
                message,
                error_type,
            } => {
                let status = match error_type {
                    ErrorResponseType::BadRequest => StatusCode::BAD_REQUEST,
                    ErrorResponseType::NotFound => StatusCode::NOT_FOUND,
                    ErrorResponseType::UncaughtError => {
                        error!(error = %message, "request failed");
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (
                    status,
                    axum::Json(ErrorResponse {
                        details,
                        message,
                        error_type,
                    }),
                )
                    .into_response()
            }
            Self::NotFound(message) => (
                StatusCode::NOT_FOUND,
                axum::Json(ErrorResponse {
                    details: None,
                    message,
                    error_type: ErrorResponseType::NotFound,
                }),
            )
                .into_response(),
        }
    }
}

impl From<QueryBuilderError> for ServerError {
    fn from(err: QueryBuilderError) -> Self {
        match err {
            QueryBuilderError::UnknownSchema(schema) | QueryBuilderError::TableMissing(schema) => {
                Self::NotFound(format!("Entity set not found: {}", schema))
            }
            QueryBuilderError::Parse { clause, .. } | QueryBuilderError::Clause { clause, .. } => {
                let details = json!({ "clause": clause.to_string() });
                Self::bad_request(err.to_string(), Some(details))
            }
            err => Self::bad_request(err.to_string(), None),
        }
    }
}

impl From<rusqlite::Error> for ServerError {
    fn from(err: rusqlite::Error) -> Self {
        Self::internal(err.to_string())
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(err.to_string())
    }
}

impl From<JoinError> for ServerError {
    fn from(err: JoinError) -> Self {
        Self::internal(err.to_string())
    }
}

impl From<QueryRejection> for ServerError {
    fn from(err: QueryRejection) -> Self {
        Self::bad_request(err.to_string(), None)
    }
}

impl From<PathRejection> for ServerError {
    fn from(err: PathRejection) -> Self {
        Self::bad_request(err.to_string(), None)
    }
}
