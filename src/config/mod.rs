//! Configuration module
//!
//! Handles loading and saving the tradewire configuration file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::client::Credentials;
use crate::network::SessionConfig;
use crate::protocol::{DEFAULT_HOST, DEFAULT_PORT, MAX_FRAME_SIZE};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server endpoint
    #[serde(default)]
    pub endpoint: EndpointConfig,

    /// Application and user credentials
    #[serde(default)]
    pub credentials: Credentials,

    /// Session timing and limits
    #[serde(default)]
    pub session: SessionSettings,
}

/// Endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Wrap the connection in TLS
    #[serde(default = "default_true")]
    pub use_tls: bool,
    /// PKCS#12 client certificate bundle
    pub identity: Option<PathBuf>,
    pub identity_password: Option<String>,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_true() -> bool {
    true
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            use_tls: true,
            identity: None,
            identity_password: None,
        }
    }
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Connection timeout in ms
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    /// Per-write deadline in ms
    #[serde(default = "default_write_timeout")]
    pub write_timeout_ms: u64,
    /// Heartbeat interval in ms
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_ms: u64,
    /// Time to wait for a reply in ms
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
    /// Largest accepted frame
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_write_timeout() -> u64 {
    5000
}

fn default_heartbeat_interval() -> u64 {
    10_000
}

fn default_request_timeout() -> u64 {
    10_000
}

fn default_max_frame_size() -> usize {
    MAX_FRAME_SIZE
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout(),
            write_timeout_ms: default_write_timeout(),
            heartbeat_interval_ms: default_heartbeat_interval(),
            request_timeout_ms: default_request_timeout(),
            max_frame_size: default_max_frame_size(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the default location
    pub fn load_default() -> ConfigResult<Self> {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("tradewire/config.toml")),
            Some(PathBuf::from("./tradewire.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                tracing::debug!("Using config file {}", path.display());
                return Self::load(path);
            }
        }

        // Return default config if no file found
        Ok(Self::default())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Transport settings for a session
    pub fn to_session_config(&self) -> SessionConfig {
        let mut config = SessionConfig::new(&self.endpoint.host, self.endpoint.port);
        config.use_tls = self.endpoint.use_tls;
        config.identity_path = self.endpoint.identity.clone();
        config.identity_password = self.endpoint.identity_password.clone();
        config.connect_timeout_ms = self.session.connect_timeout_ms;
        config.write_timeout_ms = self.session.write_timeout_ms;
        config.heartbeat_interval_ms = self.session.heartbeat_interval_ms;
        config.max_frame_size = self.session.max_frame_size;
        config
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.session.request_timeout_ms)
    }
}

/// Generate a sample configuration file
pub fn generate_sample_config() -> ConfigResult<String> {
    let config = Config {
        credentials: Credentials {
            client_id: "1234_abcdef".to_string(),
            client_secret: "application-secret".to_string(),
            access_token: "user-access-token".to_string(),
            refresh_token: "user-refresh-token".to_string(),
        },
        ..Default::default()
    };

    Ok(toml::to_string_pretty(&config)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.endpoint.host, DEFAULT_HOST);
        assert_eq!(config.endpoint.port, DEFAULT_PORT);
        assert!(config.endpoint.use_tls);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_save_and_load() {
        let mut config = Config::default();
        config.credentials.client_id = "app".to_string();
        let file = NamedTempFile::new().unwrap();

        config.save(file.path()).unwrap();

        let loaded = Config::load(file.path()).unwrap();
        assert_eq!(loaded.credentials.client_id, "app");
        assert_eq!(loaded.endpoint.port, config.endpoint.port);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[endpoint]\nhost = \"live.ctraderapi.com\"\n\n[session]\nrequest_timeout_ms = 2500").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.endpoint.host, "live.ctraderapi.com");
        assert_eq!(config.endpoint.port, DEFAULT_PORT);
        assert_eq!(config.session.heartbeat_interval_ms, 10_000);
        assert_eq!(config.request_timeout(), Duration::from_millis(2500));
    }

    #[test]
    fn test_missing_file() {
        let result = Config::load(Path::new("/nonexistent/tradewire.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_session_config_conversion() {
        let mut config = Config::default();
        config.endpoint.use_tls = false;
        config.endpoint.identity = Some(PathBuf::from("client.p12"));
        config.session.write_timeout_ms = 750;

        let session = config.to_session_config();
        assert!(!session.use_tls);
        assert_eq!(session.identity_path, Some(PathBuf::from("client.p12")));
        assert_eq!(session.write_timeout(), Duration::from_millis(750));
        assert_eq!(session.address(), format!("{}:{}", DEFAULT_HOST, DEFAULT_PORT));
    }

    #[test]
    fn test_sample_config() {
        let sample = generate_sample_config().unwrap();
        let parsed: Config = toml::from_str(&sample).unwrap();
        assert_eq!(parsed.credentials.client_id, "1234_abcdef");
    }
}
