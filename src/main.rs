mod config;

use clap::Parser as _;
use config::Config;
use edgeway::{
    build_metrics_layer_and_handle, build_metrics_router,
    engine::EchoEngine,
    lifecycle::GatewayController,
    registry::{FileRegistry, ModelRegistry, StaticRegistry},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, instrument};

#[tokio::main]
#[instrument]
pub async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse().validate()?;
    info!("Starting gateway with config: {:?}", config);

    let registry: Arc<dyn ModelRegistry> = match &config.models_file {
        Some(path) => Arc::new(FileRegistry::new(path)),
        None => Arc::new(StaticRegistry::new(config.model.clone())),
    };

    let mut controller = GatewayController::new(config.gateway_options(), registry);

    if config.metrics {
        let (prometheus_layer, handle) =
            build_metrics_layer_and_handle(config.metrics_prefix.clone());
        controller = controller.with_metrics_layer(prometheus_layer);

        let metrics_addr = SocketAddr::new(config.host, config.metrics_port);
        let metrics_listener = TcpListener::bind(metrics_addr).await?;
        info!("Metrics endpoint listening on {}", metrics_addr);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(metrics_listener, build_metrics_router(handle)).await {
                error!("Metrics server failed: {}", e);
            }
        });
    }

    // No on-device runtime is linked into the standalone binary; replies echo the prompt.
    let addr = controller.start(Arc::new(EchoEngine)).await?;
    info!("Gateway listening on {}", addr);

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");
    controller.stop().await;

    Ok(())
}
