//! Gateway configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use tsp_protocol::DEFAULT_MAX_PAYLOAD_SIZE;

use crate::error::ConfigError;
use crate::message::{ClientArgs, ServerInfo};
use crate::serde_utils::duration_secs;

/// Configuration for the gateway daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Address the HTTP/WebSocket listener binds to
    pub bind_address: String,

    /// Backend router every session connects to
    pub backend: BackendConfig,

    /// Largest packet payload accepted from the backend or a client
    pub max_payload_size: usize,

    /// Require response packets to arrive strictly in sequence order.
    ///
    /// Off by default: completion is decided by packet count alone and
    /// payloads are concatenated in arrival order.
    pub strict_sequencing: bool,

    /// Size of the buffer used for each backend read
    pub read_buffer_size: usize,

    /// Where clients are told to connect, served at `/server`
    pub advertise: AdvertiseConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            backend: BackendConfig::default(),
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            strict_sequencing: false,
            read_buffer_size: 8192,
            advertise: AdvertiseConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Check the configuration for values the gateway cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_address.trim().is_empty() {
            return Err(ConfigError::Invalid("bind_address must not be empty".into()));
        }
        if self.backend.host.trim().is_empty() {
            return Err(ConfigError::Invalid("backend.host must not be empty".into()));
        }
        if self.backend.port == 0 {
            return Err(ConfigError::Invalid("backend.port must not be 0".into()));
        }
        if self.backend.connect_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "backend.connect_timeout must be at least 1 second".into(),
            ));
        }
        if self.max_payload_size == 0 || self.max_payload_size > u32::MAX as usize {
            return Err(ConfigError::Invalid(format!(
                "max_payload_size must be between 1 and {}",
                u32::MAX
            )));
        }
        if self.read_buffer_size == 0 {
            return Err(ConfigError::Invalid("read_buffer_size must not be 0".into()));
        }
        if self.advertise.protocol.trim().is_empty() {
            return Err(ConfigError::Invalid("advertise.protocol must not be empty".into()));
        }
        Ok(())
    }

    /// Connection details advertised to clients.
    ///
    /// Host and port fall back to the bind address. An unspecified bind
    /// host (`0.0.0.0`, `[::]`) is advertised as `127.0.0.1`.
    pub fn server_info(&self) -> ServerInfo {
        let (bind_host, bind_port) = self
            .bind_address
            .rsplit_once(':')
            .unwrap_or((self.bind_address.as_str(), ""));

        let host = match &self.advertise.host {
            Some(host) => host.clone(),
            None if matches!(bind_host, "" | "0.0.0.0" | "[::]") => "127.0.0.1".to_string(),
            None => bind_host.to_string(),
        };
        let port = match self.advertise.port {
            Some(port) => port.to_string(),
            None => bind_port.to_string(),
        };

        ServerInfo {
            protocol: self.advertise.protocol.clone(),
            host,
            port,
            client_args: ClientArgs {
                upgrade: self.advertise.upgrade,
            },
        }
    }
}

/// Connection details clients discover through `/server`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvertiseConfig {
    /// Scheme clients should use
    pub protocol: String,

    /// Public host name, when it differs from the bind address
    pub host: Option<String>,

    /// Public port, when it differs from the bind address
    pub port: Option<u16>,

    /// Whether clients may upgrade their transport
    pub upgrade: bool,
}

impl Default for AdvertiseConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: None,
            port: None,
            upgrade: false,
        }
    }
}

/// Backend router connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Host name or IP address
    pub host: String,

    /// TCP port
    pub port: u16,

    /// How long to wait for the TCP connection before giving up
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 877,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl BackendConfig {
    /// Get the backend address (host:port)
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.bind_address, "0.0.0.0:3000");
        assert_eq!(config.backend.address(), "127.0.0.1:877");
        assert_eq!(config.backend.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.max_payload_size, 16 * 1024 * 1024);
        assert!(!config.strict_sequencing);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml = r#"
            strict_sequencing = true

            [backend]
            host = "10.0.0.5"
            connect_timeout = 3
        "#;

        let config: GatewayConfig = toml::from_str(toml).unwrap();
        assert!(config.strict_sequencing);
        assert_eq!(config.backend.host, "10.0.0.5");
        assert_eq!(config.backend.port, 877);
        assert_eq!(config.backend.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.read_buffer_size, 8192);
    }

    #[test]
    fn test_server_info_defaults_to_bind_address() {
        let info = GatewayConfig::default().server_info();
        assert_eq!(info.protocol, "http");
        assert_eq!(info.host, "127.0.0.1");
        assert_eq!(info.port, "3000");
        assert!(!info.client_args.upgrade);

        let config = GatewayConfig {
            bind_address: "10.1.2.3:8080".to_string(),
            ..GatewayConfig::default()
        };
        let info = config.server_info();
        assert_eq!(info.host, "10.1.2.3");
        assert_eq!(info.port, "8080");
    }

    #[test]
    fn test_server_info_uses_advertised_values() {
        let toml = r#"
            [advertise]
            protocol = "https"
            host = "gateway.example.com"
            port = 443
            upgrade = true
        "#;

        let config: GatewayConfig = toml::from_str(toml).unwrap();
        let info = config.server_info();
        assert_eq!(info.protocol, "https");
        assert_eq!(info.host, "gateway.example.com");
        assert_eq!(info.port, "443");
        assert!(info.client_args.upgrade);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = GatewayConfig::default();
        config.backend.port = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = GatewayConfig::default();
        config.backend.host = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = GatewayConfig::default();
        config.max_payload_size = 0;
        assert!(config.validate().is_err());

        let mut config = GatewayConfig::default();
        config.backend.connect_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
