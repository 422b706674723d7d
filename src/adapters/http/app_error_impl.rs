use crate::app_error::{AppError, ErrorCode};
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
            AppError::Database(_) => {
                error_resp(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DatabaseError, None)
            }
            AppError::GatewayUnavailable => {
                error_resp(StatusCode::BAD_GATEWAY, ErrorCode::GatewayUnavailable, None)
            }
            AppError::GatewayTimeout => {
                error_resp(StatusCode::GATEWAY_TIMEOUT, ErrorCode::GatewayTimeout, None)
            }
            AppError::InvalidPhoneOrNetwork(msg) => error_resp(
                StatusCode::BAD_REQUEST,
                ErrorCode::InvalidPhoneOrNetwork,
                Some(msg),
            ),
            AppError::SubscriptionNotFound => {
                error_resp(StatusCode::NOT_FOUND, ErrorCode::SubscriptionNotFound, None)
            }
            AppError::ReferenceNotFound => {
                error_resp(StatusCode::NOT_FOUND, ErrorCode::ReferenceNotFound, None)
            }
            // Internal retry signal; leaking past the retry loop is a bug.
            AppError::ConcurrentUpdate => {
                error_resp(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::InternalError, None)
            }
            AppError::TemporarilyUnavailable => error_resp(
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorCode::TemporarilyUnavailable,
                None,
            ),
            AppError::InvalidInput(msg) => {
                error_resp(StatusCode::BAD_REQUEST, ErrorCode::InvalidInput, Some(msg))
            }
            AppError::NotFound => error_resp(StatusCode::NOT_FOUND, ErrorCode::NotFound, None),
            AppError::Internal(_) => {
                error_resp(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::InternalError, None)
            }
        }
    }
}

fn error_resp(status: StatusCode, code: ErrorCode, message: Option<String>) -> Response {
    let body = match message {
        Some(msg) => serde_json::json!({ "code": code.as_str(), "message": msg }),
        None => serde_json::json!({ "code": code.as_str() }),
    };
    (status, Json(body)).into_response()
}
