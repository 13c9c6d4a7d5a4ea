//! Server configuration.

use std::net::{Ipv4Addr, SocketAddr};

/// Default max body size for requests (1 MB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Default port.
pub const DEFAULT_PORT: u16 = 3000;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to.
    pub bind_address: SocketAddr,

    /// Whether callers must send `username`/`password` when they send no
    /// token. Off for the static strategy, which ignores them.
    pub require_credentials: bool,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            require_credentials: true,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bind address.
    pub fn with_bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    pub fn with_require_credentials(mut self, required: bool) -> Self {
        self.require_credentials = required;
        self
    }

    /// Set the maximum request body size.
    pub fn with_max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_builder() {
        let config = ServerConfig::new()
            .with_bind_address("127.0.0.1:9000".parse().unwrap())
            .with_require_credentials(false)
            .with_max_body_size(512);

        assert_eq!(config.bind_address.port(), 9000);
        assert!(!config.require_credentials);
        assert_eq!(config.max_body_size, 512);
    }

    #[test]
    fn test_default_listens_on_all_interfaces() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address.to_string(), "0.0.0.0:3000");
        assert!(config.require_credentials);
    }
}
