//! Socket access for the event stream

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::trace;

use super::types::TransportError;

/// Default TCP connect timeout
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

/// Opens event stream connections
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Connect to the event socket at `host:port`
    async fn connect(
        &self,
        host: &str,
        port: u16,
    ) -> Result<Box<dyn StreamConnection>, TransportError>;
}

/// An open event stream connection
///
/// `read` must be cancel safe: the supervisor bounds it with a timeout
/// and drops the future when the timeout fires.
#[async_trait]
pub trait StreamConnection: Send {
    /// Read up to `buf.len()` bytes. `Ok(0)` means the peer closed.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Close the connection
    async fn close(&mut self);
}

/// Plain TCP transport
#[derive(Debug, Clone)]
pub struct TcpTransport {
    connect_timeout: Duration,
}

impl TcpTransport {
    pub fn new() -> Self {
        Self::with_connect_timeout(DEFAULT_CONNECT_TIMEOUT)
    }

    pub fn with_connect_timeout(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StreamTransport for TcpTransport {
    async fn connect(
        &self,
        host: &str,
        port: u16,
    ) -> Result<Box<dyn StreamConnection>, TransportError> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| {
                TransportError::ConnectionFailed(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("connect to {}:{} timed out", host, port),
                ))
            })?
            .map_err(TransportError::ConnectionFailed)?;

        stream
            .set_nodelay(true)
            .map_err(TransportError::ConnectionFailed)?;
        trace!(%host, port, "Event socket connected");

        Ok(Box::new(TcpConnection { stream }))
    }
}

struct TcpConnection {
    stream: TcpStream,
}

#[async_trait]
impl StreamConnection for TcpConnection {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        self.stream
            .read(buf)
            .await
            .map_err(TransportError::ReceiveFailed)
    }

    async fn close(&mut self) {
        // Peer may already be gone
        let _ = self.stream.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    use crate::stream::types::StreamSettings;

    #[tokio::test]
    async fn test_tcp_read_and_eof() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(b"{\"a\":1}\r\n").await.unwrap();
        });

        let mut conn = TcpTransport::new().connect("127.0.0.1", port).await.unwrap();
        server.await.unwrap();

        let mut buf = [0u8; 64];
        let mut received = Vec::new();
        loop {
            let n = conn.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            received.extend_from_slice(&buf[..n]);
        }
        assert_eq!(received, b"{\"a\":1}\r\n");
        conn.close().await;
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to get a port nobody is listening on
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let result = TcpTransport::new().connect("127.0.0.1", port).await;
        assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
    }

    #[test]
    fn test_connect_timeout_follows_settings() {
        assert!(TcpTransport::new().connect_timeout() < Duration::from_secs(1));

        let settings = StreamSettings::default();
        let transport = TcpTransport::with_connect_timeout(settings.connect_timeout);
        assert_eq!(transport.connect_timeout(), settings.connect_timeout);
    }
}
