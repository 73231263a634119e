//! Gateway configuration.

use axum::http::HeaderName;
use ratebridge_fx::FxConfig;
use std::net::SocketAddr;

/// Header the fronting authentication layer uses to assert the caller's role.
pub const DEFAULT_ROLE_HEADER: &str = "X-Authenticated-Role";

/// Main gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Listen address.
    pub listen_addr: String,
    /// Listen port.
    pub listen_port: u16,
    /// Log level used when `RUST_LOG` is unset.
    pub log_level: String,
    /// Trusted header carrying the authenticated role.
    pub role_header: String,
    /// Provider layer configuration.
    pub fx: FxConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            listen_port: 8080,
            log_level: "info".to_string(),
            role_header: DEFAULT_ROLE_HEADER.to_string(),
            fx: FxConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self {
            fx: FxConfig::from_env(),
            ..Self::default()
        };

        if let Ok(addr) = std::env::var("GATEWAY_LISTEN_ADDR") {
            config.listen_addr = addr;
        }

        if let Ok(port) = std::env::var("GATEWAY_LISTEN_PORT") {
            if let Ok(port) = port.parse() {
                config.listen_port = port;
            }
        }

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.log_level = level;
        }

        if let Ok(header) = std::env::var("GATEWAY_ROLE_HEADER") {
            config.role_header = header;
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.listen_port == 0 {
            return Err("Listen port cannot be 0".to_string());
        }

        self.socket_addr()?;
        self.role_header_name()?;
        self.fx.validate()
    }

    /// Address to bind.
    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.listen_addr, self.listen_port)
            .parse()
            .map_err(|e| format!("Invalid listen address: {e}"))
    }

    /// Parsed role header name.
    pub fn role_header_name(&self) -> Result<HeaderName, String> {
        HeaderName::from_bytes(self.role_header.trim().as_bytes())
            .map_err(|e| format!("Invalid role header '{}': {e}", self.role_header))
    }
}
