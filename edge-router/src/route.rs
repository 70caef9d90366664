//! Path classification for edge-router
//!
//! A request is routed to the API upstream when its path starts with any of
//! the configured prefixes, and to the static site otherwise.

use std::fmt;

use crate::config::DEFAULT_API_PREFIXES;

/// Upstream a request is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteKind {
    /// Backend API service
    Api,
    /// Static site host
    Static,
}

impl fmt::Display for RouteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteKind::Api => f.write_str("api"),
            RouteKind::Static => f.write_str("static"),
        }
    }
}

/// Ordered set of API path prefixes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    api_prefixes: Vec<String>,
}

impl RouteTable {
    /// Create a route table from the given prefixes
    pub fn new<I, S>(api_prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            api_prefixes: api_prefixes.into_iter().map(Into::into).collect(),
        }
    }

    /// Classify a request path
    pub fn classify(&self, path: &str) -> RouteKind {
        if self.is_api(path) {
            RouteKind::Api
        } else {
            RouteKind::Static
        }
    }

    /// Whether the path belongs to the API upstream
    pub fn is_api(&self, path: &str) -> bool {
        self.api_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// Configured prefixes, in order
    pub fn prefixes(&self) -> &[String] {
        &self.api_prefixes
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new(DEFAULT_API_PREFIXES.iter().copied())
    }
}
