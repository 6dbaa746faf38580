// Configuration types module
// Defines all configuration-related data structures

use hyper::{Method, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::BootError;
use crate::http::{CorsPolicy, OriginMatcher, OriginRule};

/// Main configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub http: HttpConfig,
    pub cors: CorsConfig,
    /// Static redirect rules, consulted when no handler matches
    pub redirects: Vec<RedirectRule>,
}

/// Server configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Worker threads of the runtime, defaults to the number of cores
    pub workers: Option<usize>,
    /// Cap on concurrently served connections
    pub max_connections: Option<usize>,
    /// Set `SO_REUSEPORT` so several processes can share the port (Unix only)
    pub reuse_port: bool,
    /// Pending-connection queue length passed to `listen`
    pub backlog: i32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            workers: None,
            max_connections: None,
            reuse_port: true,
            backlog: 1024,
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    /// Access log format (dev, common, json, or custom pattern)
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    pub error_log_file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            access_log: true,
            access_log_format: "dev".to_string(),
            access_log_file: None,
            error_log_file: None,
        }
    }
}

/// HTTP configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct HttpConfig {
    pub server_name: String,
    pub max_body_size: u64,
    pub keep_alive: bool,
    /// Per-connection timeout in seconds
    pub request_timeout: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            server_name: "rivet".to_string(),
            max_body_size: 10_485_760, // 10MB
            keep_alive: true,
            request_timeout: 30,
        }
    }
}

/// CORS configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct CorsConfig {
    pub enabled: bool,
    /// `"*"` alone allows every origin; entries containing `*` are patterns
    pub origins: Vec<String>,
    pub methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub exposed_headers: Vec<String>,
    pub credentials: bool,
    pub max_age: Option<u64>,
    pub preflight_status: u16,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            origins: vec!["*".to_string()],
            methods: ["GET", "HEAD", "PUT", "PATCH", "POST", "DELETE"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            allowed_headers: Vec::new(),
            exposed_headers: Vec::new(),
            credentials: false,
            max_age: None,
            preflight_status: 204,
        }
    }
}

impl CorsConfig {
    /// Build the policy, `None` when CORS is disabled
    pub fn to_policy(&self) -> Result<Option<CorsPolicy>, BootError> {
        if !self.enabled {
            return Ok(None);
        }

        let methods = self
            .methods
            .iter()
            .map(|m| {
                Method::from_bytes(m.trim().to_ascii_uppercase().as_bytes())
                    .map_err(|e| BootError::InvalidConfig(format!("cors.methods: '{m}': {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let status = StatusCode::from_u16(self.preflight_status).map_err(|_| {
            BootError::InvalidConfig(format!(
                "cors.preflight_status: {} is not a status code",
                self.preflight_status
            ))
        })?;

        Ok(Some(
            CorsPolicy::new(self.origin_rule())
                .methods(methods)
                .allowed_headers(self.allowed_headers.clone())
                .exposed_headers(self.exposed_headers.clone())
                .credentials(self.credentials)
                .max_age(self.max_age)
                .preflight_status(status),
        ))
    }

    fn origin_rule(&self) -> OriginRule {
        match self.origins.as_slice() {
            [] => OriginRule::Any(false),
            [only] if only == "*" => OriginRule::Any(true),
            [only] => match OriginMatcher::parse(only) {
                OriginMatcher::Exact(exact) => OriginRule::Exact(exact),
                OriginMatcher::Pattern(pattern) => OriginRule::Pattern(pattern),
            },
            many => OriginRule::List(many.iter().map(|o| OriginMatcher::parse(o)).collect()),
        }
    }
}

/// Static redirect rule
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct RedirectRule {
    pub from: String,
    pub to: String,
    #[serde(default = "default_redirect_method")]
    pub method: String,
    #[serde(default = "default_redirect_code")]
    pub status: u16,
}

#[allow(clippy::missing_const_for_fn)]
fn default_redirect_method() -> String {
    "GET".to_string()
}

#[allow(clippy::missing_const_for_fn)]
fn default_redirect_code() -> u16 {
    302
}
