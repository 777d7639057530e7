//! Axum handlers for the gateway
use crate::AppState;
use crate::codec;
use crate::errors::GatewayError;
use axum::{
    extract::State,
    http::{Uri, header},
    response::{IntoResponse, Response},
};
use tracing::{debug, error, info, instrument, warn};

/// Decode a chat request, run it through the bridge and return the engine's reply.
#[instrument(skip(state, req))]
pub async fn chat_completions(
    State(state): State<AppState>,
    req: axum::extract::Request,
) -> Result<Response, GatewayError> {
    let body_bytes = axum::body::to_bytes(req.into_body(), state.max_body_bytes)
        .await
        .map_err(|e| {
            warn!("Failed to read request body: {}", e);
            GatewayError::Body(e)
        })?;
    debug!("Received request body of size: {}", body_bytes.len());

    let request = codec::decode(&body_bytes).inspect_err(|e| warn!("Rejected request: {}", e))?;
    info!(
        model = %request.model,
        messages_count = request.messages.len(),
        "Received chat completion request"
    );

    let text = state
        .bridge
        .invoke(&request.model, &request.messages)
        .await
        .inspect_err(|e| warn!(model = %request.model, "Chat completion failed: {}", e))?;

    let (content_type, body) = codec::encode_completion(&request.model, text, state.format);
    Ok(([(header::CONTENT_TYPE, content_type)], body).into_response())
}

/// List the models currently known to the registry.
#[instrument(skip(state))]
pub async fn models(State(state): State<AppState>) -> Result<Response, GatewayError> {
    let names: Vec<String> = state
        .registry
        .list_models()
        .await
        .inspect_err(|e| error!("Model listing failed: {}", e))?
        .into_iter()
        .map(|m| m.name)
        .collect();
    debug!("Listing {} models", names.len());

    let body = codec::encode_model_listing(&names, state.format);
    Ok(([(header::CONTENT_TYPE, codec::JSON_CONTENT_TYPE)], body).into_response())
}

pub async fn unknown_route(uri: Uri) -> GatewayError {
    debug!("No route for {}", uri.path());
    GatewayError::UnknownRoute(uri.path().to_string())
}
