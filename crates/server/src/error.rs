use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use forwarder::{BuildError, TransportError};
use serde::Serialize;

/// Errors that stop the server from starting.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to bind to address: {0}")]
    Bind(#[source] std::io::Error),

    #[error("Server error: {0}")]
    Server(#[source] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Client identity is not usable: {0}")]
    Identity(String),
}

/// Errors surfaced to the caller of the relay endpoint.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The inbound request itself is malformed.
    #[error("{0}")]
    BadRequest(String),

    /// Credential material is missing or broken. Never retried.
    #[error("{0}")]
    Configuration(String),

    /// The upstream could not be reached. Never retried.
    #[error("Failed to reach upstream: {0}")]
    Transport(#[from] TransportError),
}

impl From<&BuildError> for RelayError {
    fn from(error: &BuildError) -> Self {
        Self::Configuration(error.to_string())
    }
}

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Configuration(_) | Self::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> Option<&'static str> {
        match self {
            Self::Transport(error) => Some(error.kind().code()),
            Self::BadRequest(_) | Self::Configuration(_) => None,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = ErrorResponse {
            error: self.to_string(),
            code: self.code(),
        };

        (status, Json(body)).into_response()
    }
}
