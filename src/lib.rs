//! Edgeway - an embedded OpenAI-compatible gateway for on-device inference
//!
//! This library exposes a locally running model over a small slice of the OpenAI HTTP API:
//! `POST /v1/chat/completions` and `GET /v1/models`. Requests are decoded, reduced to a prompt
//! (plus an optional image reference) and handed to a synchronous [`engine::InferenceEngine`].
//!
//! The usual entry point is [`lifecycle::GatewayController`], which owns the listening socket and
//! starts and stops the gateway for a session.

use axum::Router;
use axum::routing::{get, post};
use axum_prometheus::{
    GenericMetricLayer, Handle, PrometheusMetricLayerBuilder,
    metrics_exporter_prometheus::PrometheusHandle,
};
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{info, instrument};

pub mod bridge;
pub mod codec;
pub mod engine;
pub mod errors;
pub mod handlers;
pub mod lifecycle;
pub mod models;
pub mod registry;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use bridge::InferenceBridge;
use handlers::{chat_completions, models as models_handler, unknown_route};
use models::ResponseFormat;
use registry::ModelRegistry;

/// Default cap on request bodies. Image data URIs make chat requests much larger than text alone.
pub const DEFAULT_MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Per-session state shared by every request handler.
///
/// The bridge is bound once when the gateway starts and never changes for the lifetime of the
/// server. Nothing request-specific is kept here.
#[derive(Clone)]
pub struct AppState {
    pub bridge: InferenceBridge,
    pub registry: Arc<dyn ModelRegistry>,
    pub format: ResponseFormat,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(bridge: InferenceBridge, registry: Arc<dyn ModelRegistry>) -> Self {
        Self {
            bridge,
            registry,
            format: ResponseFormat::default(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_format(mut self, format: ResponseFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("bridge", &self.bridge)
            .field("registry", &"<registry>")
            .field("format", &self.format)
            .field("max_body_bytes", &self.max_body_bytes)
            .finish()
    }
}

/// Build the gateway router
/// This creates routes for:
/// - `POST /v1/chat/completions` - Runs the bound inference engine
/// - `GET /v1/models` - Returns the models currently in the registry
///
/// Paths are matched exactly. A known path with the wrong method gets a 405, anything else a 404
/// with an empty body.
#[instrument(skip(state))]
pub fn build_router(state: AppState) -> Router {
    info!("Building router");
    Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/models", get(models_handler))
        .fallback(unknown_route)
        .with_state(state)
}

/// Builds a router for the metrics endpoint.
#[instrument(skip(handle))]
pub fn build_metrics_router(handle: PrometheusHandle) -> Router {
    info!("Building metrics router");
    Router::new().route(
        "/metrics",
        axum::routing::get(move || async move { handle.render() }),
    )
}

pub type MetricsLayer = GenericMetricLayer<'static, PrometheusHandle, Handle>;

type MetricsLayerAndHandle = (MetricsLayer, PrometheusHandle);

/// Builds a layer and handle for prometheus metrics collection.
///
/// This installs a global recorder, so it may only be called once per process.
pub fn build_metrics_layer_and_handle(
    prefix: impl Into<Cow<'static, str>>,
) -> MetricsLayerAndHandle {
    info!("Building metrics layer");
    PrometheusMetricLayerBuilder::new()
        .with_prefix(prefix)
        .enable_response_body_size(true)
        .with_endpoint_label_type(axum_prometheus::EndpointLabel::Exact)
        .with_default_metrics()
        .build_pair()
}
