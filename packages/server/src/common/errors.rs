use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Request-shape errors for the search endpoint.
///
/// All of these are rejected before the outbound stream opens; anything
/// that goes wrong after that point is reflected only in the completion
/// tally, never as a stream-level error.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid JSON body")]
    InvalidBody,

    #[error("Unsupported city")]
    UnsupportedCity,

    #[error("Missing MINO_API_KEY")]
    MissingApiKey,
}

impl SearchError {
    fn status(&self) -> StatusCode {
        match self {
            SearchError::InvalidBody | SearchError::UnsupportedCity => StatusCode::BAD_REQUEST,
            SearchError::MissingApiKey => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for SearchError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}
