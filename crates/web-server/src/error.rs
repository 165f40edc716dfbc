use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Maps the stable error taxonomy (§7) onto HTTP status codes. This is the
/// only place in the crate that translates a domain error into wire shape.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] database::DbError),
    #[error("workflow error: {0}")]
    Workflow(#[from] workflow::WorkflowError),
    #[error("live engine error: {0}")]
    LiveEngine(#[from] live_engine::LiveEngineError),
    #[error("backtest error: {0}")]
    Backtest(#[from] backtester::BacktestError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Database(database::DbError::NotFound) => {
                (StatusCode::NOT_FOUND, "not found".to_string())
            }
            AppError::Database(e) => {
                tracing::error!(error = %e, "database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "an internal database error occurred".to_string())
            }
            AppError::Workflow(workflow::WorkflowError::SessionNotFound(id)) => {
                (StatusCode::NOT_FOUND, format!("session {id} not found"))
            }
            AppError::Workflow(workflow::WorkflowError::AlreadyStarted(id)) => {
                (StatusCode::CONFLICT, format!("workflow for session {id} was already started"))
            }
            AppError::Workflow(e) => {
                tracing::error!(error = %e, "workflow error");
                (StatusCode::INTERNAL_SERVER_ERROR, "a workflow error occurred".to_string())
            }
            AppError::LiveEngine(e) => {
                tracing::error!(error = %e, "live engine error");
                (StatusCode::INTERNAL_SERVER_ERROR, "a live engine error occurred".to_string())
            }
            AppError::Backtest(e) => {
                tracing::error!(error = %e, "backtest error");
                (StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
            }
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
