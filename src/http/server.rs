//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: admin routes first, wildcard forward route last
//! - Wire up middleware (request ID, tracing, outer timeout)
//! - Hold the configuration snapshot behind an atomically swapped Arc
//! - Apply configuration updates from the watcher
//! - Serve with graceful shutdown

use std::path::PathBuf;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::routing::any;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::admin;
use crate::config::GatewayConfig;
use crate::proxy::handler::forward;
use crate::proxy::transport::ProxyTransport;

/// One consistent view of the world: the configuration and the transport
/// built from it. Replaced wholesale on reload, never mutated in place, so
/// every in-flight request observes an internally consistent snapshot.
pub struct Inner {
    pub config: GatewayConfig,
    pub transport: ProxyTransport,
}

impl Inner {
    pub fn new(config: GatewayConfig) -> Self {
        let transport = ProxyTransport::new(&config);
        Self { config, transport }
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<ArcSwap<Inner>>,
    pub requests: Arc<AtomicUsize>,
    pub started: Instant,
    pub config_path: Arc<PathBuf>,
}

/// HTTP server for the forwarding gateway.
pub struct GatewayServer {
    router: Router,
    state: AppState,
}

impl GatewayServer {
    /// Create a new server with the given configuration.
    pub fn new(config: GatewayConfig, config_path: PathBuf) -> Self {
        let request_timeout = Duration::from_secs(config.timeouts.request_secs);
        let state = AppState {
            inner: Arc::new(ArcSwap::from_pointee(Inner::new(config))),
            requests: Arc::new(AtomicUsize::new(0)),
            started: Instant::now(),
            config_path: Arc::new(config_path),
        };
        let router = Self::build_router(state.clone(), request_timeout);
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers. Admin routes are
    /// exact matches and therefore take precedence over the wildcard, which
    /// keeps them out of the forwarding path entirely.
    fn build_router(state: AppState, request_timeout: Duration) -> Router {
        Router::new()
            .merge(admin::admin_router())
            .route("/", any(forward))
            .route("/{*path}", any(forward))
            .with_state(state)
            .layer(TimeoutLayer::new(request_timeout))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Configuration updates received on `config_updates` are swapped in
    /// between requests; listener and middleware settings need a restart.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let inner = self.state.inner.clone();
        tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                let current = inner.load();
                if new_config.listener.bind_address != current.config.listener.bind_address {
                    tracing::warn!(
                        "listener.bind_address changed; a restart is required for it to take effect"
                    );
                }
                tracing::info!(
                    target = %new_config.target.origin(),
                    proxy = %format!("{}:{}", new_config.upstream_proxy.host, new_config.upstream_proxy.port),
                    "Applying new configuration"
                );
                inner.store(Arc::new(Inner::new(new_config)));
            }
        });

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
