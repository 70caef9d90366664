//! Configuration for edge-router
//!
//! Settings are layered, lowest precedence first: built-in defaults, an
//! optional TOML file, `EDGE_ROUTER__SECTION__KEY` environment variables and
//! finally the platform variables `API_HOST`, `STATIC_HOST` and
//! `STATIC_BINDING`.

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;

use crate::error::{Result, RouterError};

/// Static site host used when `STATIC_HOST` is not set
pub const DEFAULT_STATIC_HOST: &str = "hugescreenshot-releases.pages.dev";

/// Path prefixes served by the API upstream
pub const DEFAULT_API_PREFIXES: &[&str] = &[
    "/auth/",
    "/rest/",
    "/storage/",
    "/functions/",
    "/realtime/",
    "/graphql/",
];

const ENV_PREFIX: &str = "EDGE_ROUTER";
const ENV_API_HOST: &str = "API_HOST";
const ENV_STATIC_HOST: &str = "STATIC_HOST";
const ENV_STATIC_BINDING: &str = "STATIC_BINDING";

/// Main router configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RouterConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Upstream targets
    #[serde(default)]
    pub upstreams: UpstreamConfig,
    /// Path classification
    #[serde(default)]
    pub routing: RoutingConfig,
    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Listen address (e.g., "0.0.0.0:8787")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Timeout applied by the network client to each forwarded request
    #[serde(default)]
    pub upstream_timeout_seconds: Option<u64>,
}

/// Upstream configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Hostname of the API service, no scheme and no trailing slash
    #[serde(default)]
    pub api_host: Option<String>,
    /// Hostname of the static site fallback
    #[serde(default)]
    pub static_host: Option<String>,
    /// Base URL of a directly bound static site service
    #[serde(default)]
    pub static_binding: Option<String>,
}

/// Path classification configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoutingConfig {
    /// Prefixes routed to the API upstream
    #[serde(default = "default_api_prefixes")]
    pub api_prefixes: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default filter level when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8787".to_string()
}

fn default_api_prefixes() -> Vec<String> {
    DEFAULT_API_PREFIXES.iter().map(|p| p.to_string()).collect()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            upstream_timeout_seconds: None,
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            api_prefixes: default_api_prefixes(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

impl UpstreamConfig {
    /// Configured API host, if any
    pub fn api_host(&self) -> Option<&str> {
        non_empty(self.api_host.as_ref())
    }

    /// Static site host, falling back to [`DEFAULT_STATIC_HOST`]
    pub fn static_host(&self) -> &str {
        non_empty(self.static_host.as_ref()).unwrap_or(DEFAULT_STATIC_HOST)
    }

    /// Configured static site binding, if any
    pub fn static_binding(&self) -> Option<&str> {
        non_empty(self.static_binding.as_ref())
    }
}

impl RouterConfig {
    /// Load configuration from the process environment and an optional file
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_from(path, std::env::vars().collect())
    }

    /// Load configuration from an explicit set of environment variables
    pub fn load_from(path: Option<&Path>, env: HashMap<String, String>) -> Result<Self> {
        let platform = |key: &str| {
            env.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let api_host = platform(ENV_API_HOST);
        let static_host = platform(ENV_STATIC_HOST);
        let static_binding = platform(ENV_STATIC_BINDING);

        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("routing.api_prefixes")
                    .source(Some(env.into_iter().collect())),
            )
            .set_override_option("upstreams.api_host", api_host)?
            .set_override_option("upstreams.static_host", static_host)?
            .set_override_option("upstreams.static_binding", static_binding)?
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Parsed listen address
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.server.listen_addr.parse().map_err(|e| {
            RouterError::Config(format!(
                "Invalid listen address '{}': {}",
                self.server.listen_addr, e
            ))
        })
    }

    /// Validate configuration
    ///
    /// A missing API host is not an error here: it is reported per request.
    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;

        if self.routing.api_prefixes.is_empty() {
            return Err(RouterError::Config("No API prefixes configured".to_string()));
        }
        for prefix in &self.routing.api_prefixes {
            if !prefix.starts_with('/') {
                return Err(RouterError::Config(format!(
                    "API prefix '{}' must start with '/'",
                    prefix
                )));
            }
        }

        for (name, host) in [
            ("api_host", self.upstreams.api_host()),
            ("static_host", Some(self.upstreams.static_host())),
        ] {
            if let Some(host) = host {
                if host.contains('/') {
                    return Err(RouterError::Config(format!(
                        "{} '{}' must be a bare hostname without scheme or path",
                        name, host
                    )));
                }
            }
        }

        if let Some(binding) = self.upstreams.static_binding() {
            let url = url::Url::parse(binding).map_err(|e| {
                RouterError::Config(format!("Invalid static binding URL '{}': {}", binding, e))
            })?;
            if url.scheme() != "http" || url.host_str().is_none() {
                return Err(RouterError::Config(format!(
                    "Static binding URL '{}' must be an http URL with a host",
                    binding
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_config() {
        let config = RouterConfig::default();
        assert_eq!(config.server.listen_addr, "0.0.0.0:8787");
        assert_eq!(config.routing.api_prefixes.len(), 6);
        assert_eq!(config.upstreams.api_host(), None);
        assert_eq!(config.upstreams.static_host(), DEFAULT_STATIC_HOST);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_without_sources_uses_defaults() {
        let config = RouterConfig::load_from(None, HashMap::new()).unwrap();
        assert_eq!(config.server.listen_addr, "0.0.0.0:8787");
        assert_eq!(config.routing.api_prefixes, default_api_prefixes());
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.upstreams.static_binding().is_none());
    }

    #[test]
    fn test_platform_variables() {
        let config = RouterConfig::load_from(
            None,
            env(&[
                ("API_HOST", "xyz.example.com"),
                ("STATIC_HOST", "site.example.com"),
                ("STATIC_BINDING", "http://127.0.0.1:3000"),
            ]),
        )
        .unwrap();
        assert_eq!(config.upstreams.api_host(), Some("xyz.example.com"));
        assert_eq!(config.upstreams.static_host(), "site.example.com");
        assert_eq!(config.upstreams.static_binding(), Some("http://127.0.0.1:3000"));
    }

    #[test]
    fn test_empty_platform_variables_are_unset() {
        let config =
            RouterConfig::load_from(None, env(&[("API_HOST", ""), ("STATIC_HOST", "  ")])).unwrap();
        assert_eq!(config.upstreams.api_host(), None);
        assert_eq!(config.upstreams.static_host(), DEFAULT_STATIC_HOST);
    }

    #[test]
    fn test_parse_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[server]
listen_addr = "127.0.0.1:9000"
upstream_timeout_seconds = 10

[upstreams]
api_host = "file.example.com"

[routing]
api_prefixes = ["/api/"]

[logging]
format = "json"
"#
        )
        .unwrap();

        let config = RouterConfig::load_from(Some(file.path()), HashMap::new()).unwrap();
        assert_eq!(config.server.listen_addr, "127.0.0.1:9000");
        assert_eq!(config.server.upstream_timeout_seconds, Some(10));
        assert_eq!(config.upstreams.api_host(), Some("file.example.com"));
        assert_eq!(config.routing.api_prefixes, vec!["/api/".to_string()]);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_environment_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "[upstreams]\napi_host = \"file.example.com\"\n[server]\nlisten_addr = \"127.0.0.1:9000\"\n"
        )
        .unwrap();

        let config = RouterConfig::load_from(
            Some(file.path()),
            env(&[
                ("API_HOST", "env.example.com"),
                ("EDGE_ROUTER__SERVER__LISTEN_ADDR", "127.0.0.1:9100"),
            ]),
        )
        .unwrap();
        assert_eq!(config.upstreams.api_host(), Some("env.example.com"));
        assert_eq!(config.server.listen_addr, "127.0.0.1:9100");
    }

    #[test]
    fn test_prefix_list_from_environment() {
        let config = RouterConfig::load_from(
            None,
            env(&[("EDGE_ROUTER__ROUTING__API_PREFIXES", "/api/,/v1/")]),
        )
        .unwrap();
        assert_eq!(
            config.routing.api_prefixes,
            vec!["/api/".to_string(), "/v1/".to_string()]
        );
    }

    #[test]
    fn test_missing_file_is_error() {
        let result = RouterConfig::load_from(
            Some(Path::new("/nonexistent/edge-router.toml")),
            HashMap::new(),
        );
        assert!(matches!(result, Err(RouterError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_listen_addr() {
        let mut config = RouterConfig::default();
        config.server.listen_addr = "not-an-address".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_host_with_scheme() {
        let mut config = RouterConfig::default();
        config.upstreams.api_host = Some("https://xyz.example.com".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_prefix() {
        let mut config = RouterConfig::default();
        config.routing.api_prefixes = vec!["rest/".to_string()];
        assert!(config.validate().is_err());

        config.routing.api_prefixes.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_static_binding() {
        let mut config = RouterConfig::default();
        config.upstreams.static_binding = Some("ftp://127.0.0.1".to_string());
        assert!(config.validate().is_err());

        config.upstreams.static_binding = Some("https://pages.internal".to_string());
        assert!(config.validate().is_err());

        config.upstreams.static_binding = Some("http://127.0.0.1:3000".to_string());
        assert!(config.validate().is_ok());
    }
}
