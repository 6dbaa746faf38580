// Configuration module entry point
// Loads the layered application configuration

mod types;

use std::net::SocketAddr;

use crate::error::BootError;

// Re-export public types
pub use types::{Config, CorsConfig, HttpConfig, LoggingConfig, RedirectRule, ServerConfig};

/// Prefix of environment overrides, e.g. `RIVET_SERVER__PORT=9000`
pub const ENV_PREFIX: &str = "RIVET";

impl Config {
    /// Load configuration from specified file path (without extension)
    /// Default config file is "config.toml" when no path specified
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("cors.origins")
                    .with_list_parse_key("cors.methods")
                    .with_list_parse_key("cors.allowed_headers")
                    .with_list_parse_key("cors.exposed_headers"),
            )
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.reuse_port", true)?
            .set_default("server.backlog", 1024)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "dev")?
            .set_default("http.server_name", "rivet")?
            .set_default("http.max_body_size", 10_485_760)? // 10MB
            .set_default("http.keep_alive", true)?
            .set_default("http.request_timeout", 30)?
            .set_default("cors.enabled", false)?
            .set_default("cors.credentials", false)?
            .set_default("cors.preflight_status", 204)?
            .build()?;

        settings.try_deserialize()
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, BootError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| BootError::InvalidConfig(format!("Invalid address: {e}")))
    }
}
