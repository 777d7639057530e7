//! Configuration parsing and validation for the gateway binary
//!
//! This module handles command-line argument parsing and validation using clap.
//! Every flag can also be given through an `EDGEWAY_*` environment variable.
use anyhow::anyhow;
use clap::Parser;
use edgeway::lifecycle::GatewayOptions;
use edgeway::models::ResponseFormat;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// The address on which the gateway will listen.
    #[arg(long, env = "EDGEWAY_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// The port on which the gateway will listen.
    #[arg(short = 'p', long, env = "EDGEWAY_PORT", default_value_t = 8080)]
    pub port: u16,

    /// A JSON file listing the available models. Re-read on every `/v1/models` call.
    #[arg(short = 'f', long, env = "EDGEWAY_MODELS_FILE", conflicts_with = "model")]
    pub models_file: Option<PathBuf>,

    /// A model to advertise on `/v1/models`. May be repeated.
    #[arg(long = "model", env = "EDGEWAY_MODELS", value_delimiter = ',')]
    pub model: Vec<String>,

    /// How response bodies are shaped.
    #[arg(long, env = "EDGEWAY_RESPONSE_FORMAT", value_enum, default_value_t = ResponseFormat::Raw)]
    pub response_format: ResponseFormat,

    /// Queue inference calls so the engine never runs two generations at once.
    #[arg(long, env = "EDGEWAY_SERIALIZE_INFERENCE", default_value_t = true, action = clap::ArgAction::Set)]
    pub serialize_inference: bool,

    /// Give up on an inference call after this many seconds.
    #[arg(long, env = "EDGEWAY_INFERENCE_TIMEOUT_SECS")]
    pub inference_timeout_secs: Option<u64>,

    /// How long (in seconds) in-flight requests may run after shutdown begins.
    #[arg(long, env = "EDGEWAY_SHUTDOWN_GRACE_SECS", default_value_t = 5)]
    pub shutdown_grace_secs: u64,

    /// Maximum accepted request body size, in bytes.
    #[arg(long, env = "EDGEWAY_MAX_BODY_BYTES", default_value_t = edgeway::DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,

    /// Whether to enable the metrics endpoint.
    #[arg(short = 'm', long, env = "EDGEWAY_METRICS", default_value_t = false)]
    pub metrics: bool,

    /// The port on which the metrics server will listen.
    #[arg(long, env = "EDGEWAY_METRICS_PORT", default_value_t = 9090)]
    pub metrics_port: u16,

    /// The prefix to use for metrics.
    #[arg(long, env = "EDGEWAY_METRICS_PREFIX", default_value = "edgeway")]
    pub metrics_prefix: String,
}

impl Config {
    pub fn validate(self) -> Result<Self, anyhow::Error> {
        if let Some(path) = &self.models_file
            && !path.exists()
        {
            return Err(anyhow!("Models file '{}' does not exist", path.display()));
        }
        if self.metrics && self.metrics_port == self.port {
            return Err(anyhow!(
                "Metrics port {} is the same as the gateway port",
                self.metrics_port
            ));
        }
        if self.inference_timeout_secs == Some(0) {
            return Err(anyhow!("Inference timeout must be at least one second"));
        }
        Ok(self)
    }

    pub fn gateway_options(&self) -> GatewayOptions {
        GatewayOptions::builder()
            .bind_addr(SocketAddr::new(self.host, self.port))
            .response_format(self.response_format)
            .serialize_inference(self.serialize_inference)
            .maybe_inference_timeout(self.inference_timeout_secs.map(Duration::from_secs))
            .shutdown_grace(Duration::from_secs(self.shutdown_grace_secs))
            .max_body_bytes(self.max_body_bytes)
            .build()
    }
}
