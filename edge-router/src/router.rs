//! Request router for edge-router
//!
//! Classifies each request by path prefix and forwards it to exactly one
//! upstream: the API service (with a permissive CORS header added to the
//! response) or the static site (response returned verbatim).

use axum::{
    body::Body,
    http::{
        header::{ACCESS_CONTROL_ALLOW_ORIGIN, HOST},
        uri::Scheme,
        HeaderValue, Request, Response, Uri,
    },
};
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::config::{RouterConfig, UpstreamConfig};
use crate::error::{Result, RouterError};
use crate::route::{RouteKind, RouteTable};
use crate::upstream::{strip_hop_by_hop, Upstream};

/// Edge router
pub struct Router {
    routes: RouteTable,
    upstreams: UpstreamConfig,
    network: Arc<dyn Upstream>,
    static_binding: Option<Arc<dyn Upstream>>,
}

impl Router {
    /// Create a router that forwards over `network`
    pub fn new(config: &RouterConfig, network: Arc<dyn Upstream>) -> Self {
        Self {
            routes: RouteTable::new(config.routing.api_prefixes.iter().cloned()),
            upstreams: config.upstreams.clone(),
            network,
            static_binding: None,
        }
    }

    /// Serve static paths through a direct binding instead of the network
    pub fn with_static_binding(mut self, binding: Arc<dyn Upstream>) -> Self {
        self.static_binding = Some(binding);
        self
    }

    /// Route table used for classification
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Whether static paths go through a direct binding
    pub fn has_static_binding(&self) -> bool {
        self.static_binding.is_some()
    }

    /// Handle one request
    pub async fn handle(&self, req: Request<Body>) -> Result<Response<Body>> {
        let kind = self.routes.classify(req.uri().path());
        debug!("{} {} -> {}", req.method(), req.uri().path(), kind);

        match kind {
            RouteKind::Api => self.forward_to_api(req).await,
            RouteKind::Static => self.forward_to_static(req).await,
        }
    }

    async fn forward_to_api(&self, req: Request<Body>) -> Result<Response<Body>> {
        let Some(host) = self.upstreams.api_host() else {
            warn!("API_HOST not set, rejecting {}", req.uri().path());
            return Err(RouterError::Config(
                "API_HOST environment variable not set".to_string(),
            ));
        };

        let forward = rewrite_request(req, host)?;
        debug!("Forwarding to API: {}", forward.uri());
        let response = fetch_logged(self.network.as_ref(), forward).await?;

        Ok(allow_any_origin(response))
    }

    async fn forward_to_static(&self, req: Request<Body>) -> Result<Response<Body>> {
        if let Some(binding) = &self.static_binding {
            return fetch_logged(binding.as_ref(), req).await;
        }

        let forward = rewrite_request(req, self.upstreams.static_host())?;
        debug!("Forwarding to static site: {}", forward.uri());
        fetch_logged(self.network.as_ref(), forward).await
    }
}

async fn fetch_logged(upstream: &dyn Upstream, req: Request<Body>) -> Result<Response<Body>> {
    let uri = req.uri().clone();
    upstream.fetch(req).await.map_err(|e| {
        error!("Upstream error for {}: {}", uri, e);
        e
    })
}

/// Build `https://{host}{path}?{query}` from an inbound request URI
pub fn upstream_uri(host: &str, uri: &Uri) -> Result<Uri> {
    let path_and_query = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");

    Uri::builder()
        .scheme(Scheme::HTTPS)
        .authority(host)
        .path_and_query(path_and_query)
        .build()
        .map_err(|e| RouterError::InvalidUri(format!("https://{}{}: {}", host, path_and_query, e)))
}

/// Point a request at `host`, keeping method, path, query, end-to-end headers and body
pub fn rewrite_request(req: Request<Body>, host: &str) -> Result<Request<Body>> {
    let (mut parts, body) = req.into_parts();
    parts.uri = upstream_uri(host, &parts.uri)?;

    parts.headers.remove(HOST);
    strip_hop_by_hop(&mut parts.headers);

    Ok(Request::from_parts(parts, body))
}

/// Rebuild the response with `Access-Control-Allow-Origin: *`, replacing any prior value
pub fn allow_any_origin(response: Response<Body>) -> Response<Body> {
    let (mut parts, body) = response.into_parts();
    parts
        .headers
        .insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    Response::from_parts(parts, body)
}
