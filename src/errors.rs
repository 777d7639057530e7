use crate::codec::DecodeError;
use crate::engine::InferenceError;
use crate::registry::RegistryError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::time::Duration;

/// Errors a single request can end in. None of them stop the gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("failed to read request body: {0}")]
    Body(#[source] axum::Error),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("no text content found in messages")]
    MissingPrompt,

    #[error("no route for {0}")]
    UnknownRoute(String),

    #[error("inference failed: {0}")]
    Inference(#[from] InferenceError),

    #[error("inference engine panicked")]
    InferencePanicked,

    #[error("inference did not finish within {0:?}")]
    InferenceTimeout(Duration),

    #[error("failed to list models: {0}")]
    Registry(#[from] RegistryError),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Body(_) | GatewayError::Decode(_) | GatewayError::MissingPrompt => {
                StatusCode::BAD_REQUEST
            }
            GatewayError::UnknownRoute(_) => StatusCode::NOT_FOUND,
            GatewayError::Inference(_)
            | GatewayError::InferencePanicked
            | GatewayError::Registry(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::InferenceTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            GatewayError::Body(_) | GatewayError::Decode(_) | GatewayError::MissingPrompt => {
                "invalid_request_error"
            }
            GatewayError::UnknownRoute(_) => "not_found",
            GatewayError::Inference(_) | GatewayError::InferencePanicked => "inference_error",
            GatewayError::InferenceTimeout(_) => "timeout",
            GatewayError::Registry(_) => "registry_error",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Unknown routes answer with an empty body.
        if let GatewayError::UnknownRoute(_) = self {
            return status.into_response();
        }

        let body = json!({
            "error": {
                "type": self.error_type(),
                "message": self.to_string()
            }
        });
        (status, Json(body)).into_response()
    }
}
