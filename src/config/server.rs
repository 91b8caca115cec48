use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Base path for the permissions routes (e.g., "/api/v1").
    /// Health probes are always served from "/health".
    #[serde(default = "default_api_base_path")]
    pub api_base_path: String,

    /// Request body size limit in bytes. Lookups are GET requests, so this
    /// only bounds what a misbehaving client can make us buffer.
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_base_path: default_api_base_path(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

impl ServerConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if !self.api_base_path.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "server.api_base_path must start with '/', got '{}'",
                self.api_base_path
            )));
        }
        if self.api_base_path.len() > 1 && self.api_base_path.ends_with('/') {
            return Err(ConfigError::Validation(format!(
                "server.api_base_path must not end with '/', got '{}'",
                self.api_base_path
            )));
        }
        Ok(())
    }

    /// Route prefix with the root path collapsed to an empty string, so
    /// `format!("{}/users", prefix)` never produces a double slash.
    pub fn route_prefix(&self) -> &str {
        if self.api_base_path == "/" {
            ""
        } else {
            &self.api_base_path
        }
    }

    /// Socket address string for binding.
    pub fn bind_addr(&self) -> String {
        match self.host {
            IpAddr::V6(v6) => format!("[{}]:{}", v6, self.port),
            IpAddr::V4(v4) => format!("{}:{}", v4, self.port),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

fn default_api_base_path() -> String {
    "/api/v1".to_string()
}

fn default_body_limit() -> usize {
    64 * 1024 // 64 KB
}
