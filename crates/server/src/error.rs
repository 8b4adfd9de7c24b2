use axum::{
    http::StatusCode,
    response::{IntoResponse, Json as ResponseJson, Response},
};
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unknown screen: {0}")]
    UnknownScreen(String),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::UnknownScreen(_) => StatusCode::NOT_FOUND,
            ApiError::Serde(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        let body = ApiResponse::<()>::error(&self.to_string());
        (status, ResponseJson(body)).into_response()
    }
}
