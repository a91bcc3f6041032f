use crate::app_error::AppError;
use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the error before it gets converted into a status response.
        tracing::error!(error = ?self, "Request failed");

        match self {
            AppError::Database(msg) => error_resp(StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::InvalidCredentials => {
                error_resp(StatusCode::UNAUTHORIZED, "Unauthorized".into())
            }
            AppError::InvalidInput(msg) => error_resp(StatusCode::BAD_REQUEST, msg),
            AppError::NotFound => error_resp(StatusCode::NOT_FOUND, "Not found".into()),
            AppError::Gateway(msg) => error_resp(StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::Internal(msg) => error_resp(StatusCode::INTERNAL_SERVER_ERROR, msg),
        }
    }
}

fn error_resp(status: StatusCode, message: String) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}
