//! Upstream fetch capability
//!
//! An [`Upstream`] takes a request and returns a response. The router uses
//! one for the network (API and static-by-host branches) and optionally a
//! second one as a direct binding to the static site service.

use async_trait::async_trait;
use axum::{
    body::{Body, HttpBody},
    http::{
        header::HOST,
        uri::{Authority, PathAndQuery, Scheme},
        HeaderMap, HeaderValue, Request, Response, Uri, Version,
    },
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::fmt::Display;
use std::time::Duration;
use tower::{Service, ServiceExt};
use tracing::debug;

use crate::error::{Result, RouterError};

/// Maximum number of redirects followed by [`HttpUpstream`]
pub const MAX_REDIRECTS: usize = 10;

/// Headers that describe a single transport hop and are not forwarded
pub const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

/// Remove [`HOP_BY_HOP_HEADERS`] from `headers`
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(*name);
    }
}

/// Something that can serve a forwarded request
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Execute the request and return the upstream's response
    async fn fetch(&self, req: Request<Body>) -> Result<Response<Body>>;
}

/// Network client for absolute `http`/`https` URLs
///
/// Redirects are followed transparently. Request and response bodies are
/// streamed.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
}

impl HttpUpstream {
    /// Create a client, optionally bounding each request by `timeout`
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder =
            reqwest::Client::builder().redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|e| RouterError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn fetch(&self, req: Request<Body>) -> Result<Response<Body>> {
        let (parts, body) = req.into_parts();
        debug!("Fetching {} {}", parts.method, parts.uri);

        let mut request = self
            .client
            .request(parts.method, parts.uri.to_string())
            .headers(parts.headers);

        // An empty stream would otherwise go out as a chunked body
        if !(body.is_end_stream() || body.size_hint().exact() == Some(0)) {
            request = request.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }

        let response = request
            .send()
            .await
            .map_err(|e| RouterError::UpstreamFetch(e.to_string()))?;

        let status = response.status();
        let mut headers = response.headers().clone();
        strip_hop_by_hop(&mut headers);

        let mut forwarded = Response::new(Body::from_stream(response.bytes_stream()));
        *forwarded.status_mut() = status;
        *forwarded.headers_mut() = headers;
        Ok(forwarded)
    }
}

/// Direct binding to a co-located static site service over plain HTTP
///
/// Only the scheme and authority of the request URI are pointed at the
/// binding. Method, path, query, headers and body pass through unmodified.
#[derive(Clone)]
pub struct BindingUpstream {
    scheme: Scheme,
    authority: Authority,
    client: Client<HttpConnector, Body>,
}

impl BindingUpstream {
    /// Create a binding to `base_url` (e.g. "http://127.0.0.1:3000")
    pub fn new(base_url: &str) -> Result<Self> {
        let uri: Uri = base_url.parse().map_err(|e| {
            RouterError::Config(format!("Invalid static binding URL '{}': {}", base_url, e))
        })?;

        let scheme = uri.scheme().cloned().unwrap_or(Scheme::HTTP);
        if scheme != Scheme::HTTP {
            return Err(RouterError::Config(format!(
                "Static binding URL '{}' must use http",
                base_url
            )));
        }
        let authority = uri.authority().cloned().ok_or_else(|| {
            RouterError::Config(format!("Static binding URL '{}' has no host", base_url))
        })?;

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(30))
            .build_http();

        Ok(Self {
            scheme,
            authority,
            client,
        })
    }

    /// Address requests are delegated to
    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    fn rebase(&self, uri: Uri) -> Result<Uri> {
        let mut parts = uri.into_parts();
        parts.scheme = Some(self.scheme.clone());
        parts.authority = Some(self.authority.clone());
        if parts.path_and_query.is_none() {
            parts.path_and_query = Some(PathAndQuery::from_static("/"));
        }
        Uri::from_parts(parts).map_err(|e| RouterError::InvalidUri(e.to_string()))
    }
}

#[async_trait]
impl Upstream for BindingUpstream {
    async fn fetch(&self, req: Request<Body>) -> Result<Response<Body>> {
        let (mut parts, body) = req.into_parts();

        // HTTP/2 requests carry the host in the URI authority, not a header
        if !parts.headers.contains_key(HOST) {
            if let Some(authority) = parts.uri.authority() {
                if let Ok(host) = HeaderValue::from_str(authority.as_str()) {
                    parts.headers.insert(HOST, host);
                }
            }
        }

        // The binding client speaks HTTP/1 only, whatever the inbound version
        parts.version = Version::HTTP_11;
        parts.uri = self.rebase(parts.uri)?;
        debug!("Delegating {} {} to static binding", parts.method, parts.uri);

        let response = self
            .client
            .request(Request::from_parts(parts, body))
            .await
            .map_err(|e| RouterError::UpstreamFetch(e.to_string()))?;

        let (parts, body) = response.into_parts();
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

/// In-process binding backed by any tower service, such as an `axum::Router`
#[derive(Debug, Clone)]
pub struct ServiceBinding<S> {
    service: S,
}

impl<S> ServiceBinding<S> {
    /// Wrap a service
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> Upstream for ServiceBinding<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + Sync + 'static,
    S::Error: Display,
    S::Future: Send,
{
    async fn fetch(&self, req: Request<Body>) -> Result<Response<Body>> {
        self.service
            .clone()
            .oneshot(req)
            .await
            .map_err(|e| RouterError::UpstreamFetch(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get};
    use http_body_util::BodyExt;

    #[test]
    fn test_binding_rebase_keeps_path_and_query() {
        let binding = BindingUpstream::new("http://127.0.0.1:3000").unwrap();
        let uri = binding.rebase("/confirm.html?token=abc".parse().unwrap()).unwrap();
        assert_eq!(uri.to_string(), "http://127.0.0.1:3000/confirm.html?token=abc");
    }

    #[test]
    fn test_strip_hop_by_hop() {
        let mut headers = HeaderMap::new();
        for name in HOP_BY_HOP_HEADERS {
            headers.insert(*name, HeaderValue::from_static("x"));
        }
        headers.insert("content-type", HeaderValue::from_static("text/html"));
        headers.insert("x-trace-id", HeaderValue::from_static("abc"));

        strip_hop_by_hop(&mut headers);
        assert_eq!(headers.len(), 2);
        assert_eq!(headers["content-type"], "text/html");
        assert_eq!(headers["x-trace-id"], "abc");
    }

    #[test]
    fn test_binding_rejects_invalid_url() {
        assert!(BindingUpstream::new("https://pages.internal").is_err());
        assert!(BindingUpstream::new("/just/a/path").is_err());
        assert!(BindingUpstream::new("not a url").is_err());
    }

    #[test]
    fn test_binding_authority() {
        let binding = BindingUpstream::new("http://pages.internal:8080").unwrap();
        assert_eq!(binding.authority().as_str(), "pages.internal:8080");
    }

    #[test]
    fn test_http_upstream_builds() {
        assert!(HttpUpstream::new(None).is_ok());
        assert!(HttpUpstream::new(Some(Duration::from_secs(5))).is_ok());
    }

    #[tokio::test]
    async fn test_service_binding_delegates() {
        let site = axum::Router::new().route("/index.html", get(|| async { "<h1>home</h1>" }));
        let binding = ServiceBinding::new(site);

        let req = Request::builder()
            .uri("/index.html")
            .body(Body::empty())
            .unwrap();
        let response = binding.fetch(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"<h1>home</h1>");
    }

    #[tokio::test]
    async fn test_http_upstream_connection_failure() {
        let upstream = HttpUpstream::new(Some(Duration::from_secs(5))).unwrap();
        // Port 9 (discard) is not expected to accept connections on loopback
        let req = Request::builder()
            .uri("http://127.0.0.1:9/")
            .body(Body::empty())
            .unwrap();
        let err = upstream.fetch(req).await.unwrap_err();
        assert!(matches!(err, RouterError::UpstreamFetch(_)));
    }
}
