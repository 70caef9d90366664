//! edge-router: path-based edge request router
//!
//! Forwards every request to one of two upstreams based on its path:
//! the backend API service or the static site host.
//!
//! # Features
//!
//! - Prefix classification (`/auth/`, `/rest/`, `/storage/`, `/functions/`,
//!   `/realtime/`, `/graphql/` go to the API)
//! - Host-only URL rewrite, method/headers/body streamed through
//! - `Access-Control-Allow-Origin: *` on API responses
//! - Direct binding to a co-located static site service
//!
//! # Example Configuration
//!
//! ```toml
//! [server]
//! listen_addr = "0.0.0.0:8787"
//!
//! [upstreams]
//! api_host = "xyz.supabase.co"
//! static_host = "my-site.pages.dev"
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```
//!
//! `API_HOST`, `STATIC_HOST` and `STATIC_BINDING` in the environment take
//! precedence over the file.

pub mod config;
pub mod error;
pub mod route;
pub mod router;
pub mod server;
pub mod upstream;

pub use config::RouterConfig;
pub use error::{Result, RouterError};
pub use route::{RouteKind, RouteTable};
pub use router::Router;
pub use server::EdgeServer;
pub use upstream::{BindingUpstream, HttpUpstream, ServiceBinding, Upstream};
