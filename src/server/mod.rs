//! Web server
//!
//! Serves the demo page, the prediction API and the generated files.

mod cleanup;
mod http;
mod page;
mod state;

pub use cleanup::{prune_dir, start_cleanup_task};
pub use http::{PredictResponse, create_router};
pub use page::{LICENSE_NOTICE, TITLE, escape_html};
pub use state::AppState;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::engine::TTSError;
use crate::reference::ReferenceError;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Upload too large")]
    PayloadTooLarge,

    #[error(transparent)]
    Prediction(#[from] TTSError),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::Prediction(err) => match err {
                TTSError::PromptTooShort | TTSError::MissingReference => StatusCode::BAD_REQUEST,
                TTSError::Reference(ReferenceError::IoError(_)) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                TTSError::Reference(ReferenceError::TranscoderUnavailable(_)) => {
                    StatusCode::UNSUPPORTED_MEDIA_TYPE
                }
                TTSError::Reference(_) => StatusCode::BAD_REQUEST,
                TTSError::DeviceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                TTSError::BackendError(_) => StatusCode::BAD_GATEWAY,
                TTSError::Waveform(_) | TTSError::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServerError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(%status, "Request failed: {}", self);
        } else {
            tracing::warn!(%status, "Request rejected: {}", self);
        }

        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
