use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dashd::SupervisorError;

use crate::model::Envelope;

#[derive(Debug, thiserror::Error)]
pub enum WebError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("rate limited")]
    RateLimited,
    #[error("{0}")]
    Internal(String),
}

impl WebError {
    pub fn status(&self) -> StatusCode {
        match self {
            WebError::BadRequest(_) => StatusCode::BAD_REQUEST,
            WebError::NotFound(_) => StatusCode::NOT_FOUND,
            WebError::Conflict(_) => StatusCode::CONFLICT,
            WebError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            WebError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<SupervisorError> for WebError {
    fn from(err: SupervisorError) -> Self {
        let message = err.to_string();
        match err {
            SupervisorError::InvalidArgument { .. } => WebError::BadRequest(message),
            SupervisorError::NotFound { .. } => WebError::NotFound(message),
            SupervisorError::Conflict { .. } => WebError::Conflict(message),
            SupervisorError::NotInstalled { .. } | SupervisorError::Internal { .. } => {
                WebError::Internal(message)
            }
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(Envelope::error(self.to_string()))).into_response()
    }
}
