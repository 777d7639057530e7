//! Starting and stopping the gateway.
//!
//! A [`GatewayController`] owns at most one listening socket. It is either stopped or running,
//! and every transition goes through a single lock so two callers can never race to bind the
//! port. The server itself runs on a spawned task: neither `start` nor `stop` ever waits on the
//! inference engine.
//!
//! Dropping a running controller signals the server to shut down gracefully.
use crate::bridge::InferenceBridge;
use crate::engine::InferenceEngine;
use crate::models::ResponseFormat;
use crate::registry::ModelRegistry;
use crate::{AppState, DEFAULT_MAX_BODY_BYTES, MetricsLayer, build_router};
use bon::Builder;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// `0.0.0.0:8080`, where the gateway listens unless told otherwise.
pub const DEFAULT_BIND_ADDR: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8080);

/// How a gateway session is served.
#[derive(Debug, Clone, Builder)]
pub struct GatewayOptions {
    #[builder(default = DEFAULT_BIND_ADDR)]
    pub bind_addr: SocketAddr,
    #[builder(default)]
    pub response_format: ResponseFormat,
    /// Queue engine calls so at most one generation runs at a time.
    #[builder(default = true)]
    pub serialize_inference: bool,
    pub inference_timeout: Option<Duration>,
    /// How long `stop` lets in-flight requests finish before abandoning them.
    #[builder(default = Duration::from_secs(5))]
    pub shutdown_grace: Duration,
    #[builder(default = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        GatewayOptions::builder().build()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("gateway is already running on {0}")]
    AlreadyRunning(SocketAddr),

    #[error("failed to bind gateway on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// What the gateway is doing, as reported to whoever drives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayStatus {
    Stopped,
    Running(SocketAddr),
}

impl fmt::Display for GatewayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayStatus::Stopped => write!(f, "Gateway stopped"),
            GatewayStatus::Running(addr) => write!(f, "Gateway running on {addr}"),
        }
    }
}

struct RunningServer {
    local_addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

enum ServerState {
    Stopped,
    Running(RunningServer),
}

impl ServerState {
    /// A server task that exited on its own leaves nothing to stop.
    fn reap(&mut self) {
        if let ServerState::Running(server) = self
            && server.task.is_finished()
        {
            warn!("Gateway on {} exited unexpectedly", server.local_addr);
            *self = ServerState::Stopped;
        }
    }

    fn status(&self) -> GatewayStatus {
        match self {
            ServerState::Stopped => GatewayStatus::Stopped,
            ServerState::Running(server) => GatewayStatus::Running(server.local_addr),
        }
    }
}

/// Owns the gateway's listening socket for whoever manages its lifetime.
pub struct GatewayController {
    options: GatewayOptions,
    registry: Arc<dyn ModelRegistry>,
    metrics_layer: Option<MetricsLayer>,
    state: Mutex<ServerState>,
}

impl fmt::Debug for GatewayController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayController")
            .field("options", &self.options)
            .field("metrics", &self.metrics_layer.is_some())
            .finish()
    }
}

impl GatewayController {
    pub fn new(options: GatewayOptions, registry: Arc<dyn ModelRegistry>) -> Self {
        Self {
            options,
            registry,
            metrics_layer: None,
            state: Mutex::new(ServerState::Stopped),
        }
    }

    /// Record request metrics on every server this controller starts.
    pub fn with_metrics_layer(mut self, layer: MetricsLayer) -> Self {
        self.metrics_layer = Some(layer);
        self
    }

    pub fn options(&self) -> &GatewayOptions {
        &self.options
    }

    /// Bind the listener and start serving with `engine` bound for the whole session.
    ///
    /// Returns the address actually bound, which differs from the configured one when binding
    /// port 0.
    pub async fn start(
        &self,
        engine: Arc<dyn InferenceEngine>,
    ) -> Result<SocketAddr, LifecycleError> {
        let mut state = self.state.lock().await;
        self.start_locked(&mut state, engine).await
    }

    /// Stop serving and release the port. Returns `false` if the gateway was not running.
    pub async fn stop(&self) -> bool {
        let mut state = self.state.lock().await;
        self.stop_locked(&mut state).await
    }

    /// Start the gateway if it is stopped, stop it if it is running.
    pub async fn toggle(
        &self,
        engine: Arc<dyn InferenceEngine>,
    ) -> Result<GatewayStatus, LifecycleError> {
        let mut state = self.state.lock().await;
        state.reap();
        if matches!(*state, ServerState::Running(_)) {
            self.stop_locked(&mut state).await;
            Ok(GatewayStatus::Stopped)
        } else {
            let addr = self.start_locked(&mut state, engine).await?;
            Ok(GatewayStatus::Running(addr))
        }
    }

    pub async fn status(&self) -> GatewayStatus {
        let mut state = self.state.lock().await;
        state.reap();
        state.status()
    }

    pub async fn is_running(&self) -> bool {
        matches!(self.status().await, GatewayStatus::Running(_))
    }

    pub async fn local_addr(&self) -> Option<SocketAddr> {
        match self.status().await {
            GatewayStatus::Running(addr) => Some(addr),
            GatewayStatus::Stopped => None,
        }
    }

    #[instrument(skip(self, state, engine), fields(bind_addr = %self.options.bind_addr))]
    async fn start_locked(
        &self,
        state: &mut ServerState,
        engine: Arc<dyn InferenceEngine>,
    ) -> Result<SocketAddr, LifecycleError> {
        state.reap();
        if let ServerState::Running(server) = state {
            return Err(LifecycleError::AlreadyRunning(server.local_addr));
        }

        let bind_addr = self.options.bind_addr;
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|source| LifecycleError::Bind {
                addr: bind_addr,
                source,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| LifecycleError::Bind {
                addr: bind_addr,
                source,
            })?;

        let bridge = InferenceBridge::with_options(
            engine,
            self.options.serialize_inference,
            self.options.inference_timeout,
        );
        let app_state = AppState::new(bridge, Arc::clone(&self.registry))
            .with_format(self.options.response_format)
            .with_max_body_bytes(self.options.max_body_bytes);
        let mut router = build_router(app_state);
        if let Some(layer) = &self.metrics_layer {
            router = router.layer(layer.clone());
        }

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    // Resolves on an explicit stop, or when the controller is dropped.
                    let _ = shutdown_rx.await;
                })
                .await
        });

        info!("Gateway listening on {}", local_addr);
        *state = ServerState::Running(RunningServer {
            local_addr,
            shutdown_tx,
            task,
        });
        Ok(local_addr)
    }

    async fn stop_locked(&self, state: &mut ServerState) -> bool {
        let server = match std::mem::replace(state, ServerState::Stopped) {
            ServerState::Stopped => {
                debug!("Gateway already stopped");
                return false;
            }
            ServerState::Running(server) => server,
        };

        let RunningServer {
            local_addr,
            shutdown_tx,
            mut task,
        } = server;
        info!("Stopping gateway on {}", local_addr);
        let _ = shutdown_tx.send(());

        match tokio::time::timeout(self.options.shutdown_grace, &mut task).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => warn!("Gateway on {} exited with error: {}", local_addr, e),
            Ok(Err(e)) => warn!("Gateway task on {} failed: {}", local_addr, e),
            Err(_) => {
                warn!(
                    "In-flight requests did not finish within {:?}, abandoning them",
                    self.options.shutdown_grace
                );
                task.abort();
                let _ = task.await;
            }
        }

        info!("Gateway stopped");
        true
    }
}
