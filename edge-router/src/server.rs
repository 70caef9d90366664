//! HTTP server hosting the edge router

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::RouterConfig;
use crate::error::Result;
use crate::router::Router as EdgeRouter;
use crate::upstream::{BindingUpstream, HttpUpstream};

/// Edge router server
pub struct EdgeServer {
    config: RouterConfig,
    router: Arc<EdgeRouter>,
}

impl EdgeServer {
    /// Create a server with network and binding upstreams built from `config`
    pub fn new(config: RouterConfig) -> Result<Self> {
        config.validate()?;

        let timeout = config
            .server
            .upstream_timeout_seconds
            .map(Duration::from_secs);
        let network = Arc::new(HttpUpstream::new(timeout)?);

        let mut router = EdgeRouter::new(&config, network);
        if let Some(binding) = config.upstreams.static_binding() {
            router = router.with_static_binding(Arc::new(BindingUpstream::new(binding)?));
        }

        Ok(Self::with_router(config, router))
    }

    /// Create a server around an already assembled router
    pub fn with_router(config: RouterConfig, router: EdgeRouter) -> Self {
        Self {
            config,
            router: Arc::new(router),
        }
    }

    /// Build the Axum app. Every path is handed to the edge router.
    pub fn app(&self) -> Router {
        Router::new()
            .fallback(route_request)
            .layer(TraceLayer::new_for_http())
            .with_state(self.router.clone())
    }

    /// Bind the configured address and serve until ctrl-c or SIGTERM
    pub async fn run(&self) -> Result<()> {
        let addr = self.config.listen_addr()?;
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on `listener` until `shutdown` completes, then drain in-flight requests
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.log_settings(&listener);

        axum::serve(listener, self.app())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Edge router stopped");
        Ok(())
    }

    fn log_settings(&self, listener: &TcpListener) {
        match listener.local_addr() {
            Ok(addr) => info!("Starting edge router on {}", addr),
            Err(e) => warn!("Starting edge router on unknown address: {}", e),
        }

        let upstreams = &self.config.upstreams;
        match upstreams.api_host() {
            Some(host) => info!("API upstream: https://{}", host),
            None => warn!("API_HOST not set, API requests will fail with 500"),
        }
        match upstreams.static_binding() {
            Some(binding) => info!("Static upstream: binding {}", binding),
            None if self.router.has_static_binding() => info!("Static upstream: in-process binding"),
            None => info!("Static upstream: https://{}", upstreams.static_host()),
        }

        info!("API prefixes:");
        for prefix in self.router.routes().prefixes() {
            info!("  {}", prefix);
        }
    }
}

/// Fallback handler: forward through the edge router
async fn route_request(State(router): State<Arc<EdgeRouter>>, req: Request<Body>) -> Response {
    match router.handle(req).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl-c, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
