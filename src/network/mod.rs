//! Network module - Owns the TLS/TCP stream of a session
//!
//! Provides:
//! - Dialers for establishing the stream (TLS or plain TCP)
//! - The transport session with its read and keep-alive loops

mod dialer;
mod session;

pub use dialer::*;
pub use session::*;

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a transport session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Host to connect to (also used for TLS server name verification)
    pub host: String,
    /// Port to connect to
    pub port: u16,
    /// Whether to use TLS encryption
    pub use_tls: bool,
    /// Path to a PKCS#12 client certificate bundle
    pub identity_path: Option<PathBuf>,
    /// Password of the client certificate bundle
    pub identity_password: Option<String>,
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Per-write deadline in milliseconds
    pub write_timeout_ms: u64,
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval_ms: u64,
    /// Maximum envelope size
    pub max_frame_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: crate::protocol::DEFAULT_HOST.to_string(),
            port: crate::protocol::DEFAULT_PORT,
            use_tls: true,
            identity_path: None,
            identity_password: None,
            connect_timeout_ms: 5000,
            write_timeout_ms: 5000,
            heartbeat_interval_ms: 10_000,
            max_frame_size: crate::protocol::MAX_FRAME_SIZE,
        }
    }
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_identity(mut self, path: PathBuf, password: Option<String>) -> Self {
        self.identity_path = Some(path);
        self.identity_password = password;
        self
    }

    pub fn without_tls(mut self) -> Self {
        self.use_tls = false;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// `host:port` string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
