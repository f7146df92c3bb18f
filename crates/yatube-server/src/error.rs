use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use thiserror::Error;
use yatube_store::StoreError;

use crate::render;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Not found")]
    NotFound,

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Media storage error: {0}")]
    Media(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ServerError::NotFound,
            other => ServerError::Store(other),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        match &self {
            ServerError::NotFound => {
                (StatusCode::NOT_FOUND, Html(render::not_found_page())).into_response()
            }
            ServerError::Store(_) | ServerError::Media(_) | ServerError::Internal(_) => {
                tracing::error!(error = %self, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Html(render::server_error_page()),
                )
                    .into_response()
            }
            ServerError::BadRequest(_) => json_error(StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::Unauthorized(_) => json_error(StatusCode::UNAUTHORIZED, self.to_string()),
            ServerError::Forbidden(_) => json_error(StatusCode::FORBIDDEN, self.to_string()),
        }
    }
}

fn json_error(status: StatusCode, message: String) -> Response {
    let body = serde_json::json!({
        "error": message,
    });

    (status, axum::Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_maps_to_not_found() {
        assert!(matches!(
            ServerError::from(StoreError::NotFound),
            ServerError::NotFound
        ));
        assert!(matches!(
            ServerError::from(StoreError::Conflict("dup".into())),
            ServerError::Store(_)
        ));
    }

    #[test]
    fn status_codes() {
        let cases = [
            (ServerError::NotFound, StatusCode::NOT_FOUND),
            (ServerError::Media("disk".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (ServerError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (ServerError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (ServerError::Forbidden("x".into()), StatusCode::FORBIDDEN),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
