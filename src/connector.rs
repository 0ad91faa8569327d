//! Connection establishment for test phases
//!
//! Every phase opens its own connection. The runner only depends on the
//! [`Connector`] trait so tests can substitute in-memory streams.

use crate::{
    error::{AppError, Result},
    models::normalize_server_address,
};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Source of fresh connections to the throughput server
#[async_trait]
pub trait Connector: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Open a new connection
    async fn connect(&self) -> Result<Self::Stream>;

    /// Human readable description of where connections go
    fn target(&self) -> &str;
}

/// TCP connector with a bounded connect time
#[derive(Debug, Clone)]
pub struct TcpConnector {
    address: String,
    timeout: Duration,
}

impl TcpConnector {
    /// Create a connector; the address is normalized to `host:port`
    pub fn new(address: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            address: normalize_server_address(address)?,
            timeout,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self) -> Result<TcpStream> {
        let stream = timeout(self.timeout, TcpStream::connect(self.address.as_str()))
            .await
            .map_err(|_| {
                AppError::timeout(format!(
                    "Connecting to {} timed out after {}s",
                    self.address,
                    self.timeout.as_secs_f64()
                ))
            })?
            .map_err(|e| AppError::network(format!("Failed to connect to {}: {}", self.address, e)))?;

        // Command line goes out without waiting for more data
        stream
            .set_nodelay(true)
            .map_err(|e| AppError::network(format!("Failed to configure socket for {}: {}", self.address, e)))?;

        Ok(stream)
    }

    fn target(&self) -> &str {
        &self.address
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_address_normalized() {
        let connector = TcpConnector::new("localhost", Duration::from_secs(1)).unwrap();
        assert_eq!(connector.address(), "localhost:7121");
        assert_eq!(connector.target(), "localhost:7121");
        assert!(TcpConnector::new("", Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn test_connects_to_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let connector = TcpConnector::new(&address, Duration::from_secs(2)).unwrap();

        let accept = tokio::spawn(async move { listener.accept().await.map(|_| ()) });
        let stream = connector.connect().await.unwrap();
        assert!(stream.nodelay().unwrap());
        accept.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_refused_connection_is_network_error() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let connector = TcpConnector::new(&address, Duration::from_secs(2)).unwrap();
        let error = connector.connect().await.unwrap_err();
        assert_eq!(error.category(), "NETWORK");
        assert!(error.is_recoverable());
    }
}
