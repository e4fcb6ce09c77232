//! Stream establishment
//!
//! The session only needs a bidirectional byte stream; how it is obtained is
//! behind the [`Dialer`] trait so tests can hand in in-memory pipes.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_native_tls::native_tls;

use super::{SessionConfig, SessionError, SessionResult};

/// Bidirectional byte stream a session runs over
pub trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> AsyncStream for T {}

pub type BoxedStream = Box<dyn AsyncStream>;

/// Opens the stream for a session
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, config: &SessionConfig) -> SessionResult<BoxedStream>;
}

/// Dials TCP, wrapped in TLS unless the config disables it
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpDialer;

impl TcpDialer {
    fn tls_connector(config: &SessionConfig) -> SessionResult<tokio_native_tls::TlsConnector> {
        let mut builder = native_tls::TlsConnector::builder();

        if let Some(path) = &config.identity_path {
            let der = std::fs::read(path).map_err(|e| {
                SessionError::Identity(format!("{}: {}", path.display(), e))
            })?;
            let password = config.identity_password.as_deref().unwrap_or("");
            let identity = native_tls::Identity::from_pkcs12(&der, password)
                .map_err(|e| SessionError::Identity(format!("{}: {}", path.display(), e)))?;
            builder.identity(identity);
        }

        Ok(tokio_native_tls::TlsConnector::from(builder.build()?))
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    async fn dial(&self, config: &SessionConfig) -> SessionResult<BoxedStream> {
        let tcp = TcpStream::connect((config.host.as_str(), config.port)).await?;
        tcp.set_nodelay(true)?;

        if !config.use_tls {
            tracing::debug!("Connected to {} (plain TCP)", config.address());
            return Ok(Box::new(tcp));
        }

        let connector = Self::tls_connector(config)?;
        let tls = connector.connect(&config.host, tcp).await?;
        tracing::debug!("Connected to {} (TLS)", config.address());
        Ok(Box::new(tls))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_missing_identity_is_reported() {
        let config = SessionConfig::default()
            .with_identity(PathBuf::from("/nonexistent/client.p12"), None);

        assert!(matches!(
            TcpDialer::tls_connector(&config),
            Err(SessionError::Identity(_))
        ));
    }

    #[tokio::test]
    async fn test_plain_dial_to_local_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let config = SessionConfig::new("127.0.0.1", port).without_tls();

        let (accepted, dialed) = tokio::join!(listener.accept(), TcpDialer.dial(&config));
        assert!(accepted.is_ok());
        assert!(dialed.is_ok());
    }
}
