//! The relay's error taxonomy.
//!
//! Exactly three things can go wrong while relaying a chat request, and all
//! of them end the request with a well-formed HTTP response carrying a JSON
//! `{"detail": ...}` body. Nothing is retried.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The inbound body could not be parsed as JSON. No upstream call is
    /// made for these.
    #[error("JSON invalide.")]
    InvalidPayload(#[source] serde_json::Error),

    /// The upstream could not be reached, or the connection failed while
    /// the response was being read.
    #[error("Erreur lors de la connexion à Ollama : {0}")]
    UpstreamUnreachable(Box<dyn std::error::Error + Send + Sync>),

    /// The upstream answered the buffered path with a body that is not
    /// JSON. The invalid body itself is withheld from the caller.
    #[error("Réponse invalide de Ollama : {0}")]
    InvalidUpstreamPayload(#[source] serde_json::Error),
}

/// Wire shape of every error response.
#[derive(Debug, Serialize)]
struct ErrorDetail {
    detail: String,
}

impl RelayError {
    fn status_code(&self) -> StatusCode {
        match self {
            RelayError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            RelayError::UpstreamUnreachable(_) | RelayError::InvalidUpstreamPayload(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        error!("Chat relay failed: {self}");
        (
            self.status_code(),
            Json(ErrorDetail {
                detail: self.to_string(),
            }),
        )
            .into_response()
    }
}
