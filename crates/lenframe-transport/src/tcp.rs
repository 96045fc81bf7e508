use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::NetStream;

/// Default timeout for establishing a connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens client-side TCP connections.
///
/// The address is resolved on every call and each resolved socket address is
/// tried in order. The first successful connection wins; if all attempts
/// fail, the last error is returned.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    connect_timeout: Option<Duration>,
    nodelay: bool,
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self {
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            nodelay: true,
        }
    }
}

impl TcpConnector {
    /// Create a connector with the default timeout and `TCP_NODELAY` enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-address connect timeout. `None` blocks for as long as the OS allows.
    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Enable or disable `TCP_NODELAY` on established streams.
    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }

    /// Configured connect timeout.
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }

    /// Connect to `addr` (blocking).
    pub fn connect(&self, addr: &str) -> Result<NetStream> {
        let candidates = resolve(addr)?;

        let mut last_err = None;
        for candidate in candidates {
            let attempt = match self.connect_timeout {
                Some(timeout) => TcpStream::connect_timeout(&candidate, timeout),
                None => TcpStream::connect(candidate),
            };
            match attempt {
                Ok(stream) => {
                    stream.set_nodelay(self.nodelay)?;
                    info!(addr, peer = %candidate, "connected");
                    return Ok(NetStream::from(stream));
                }
                Err(err) => {
                    debug!(addr, peer = %candidate, error = %err, "connect attempt failed");
                    last_err = Some(err);
                }
            }
        }

        Err(TransportError::Connect {
            addr: addr.to_string(),
            source: last_err.unwrap_or_else(|| std::io::Error::other("no address attempted")),
        })
    }

    /// Connect to `addr` on the tokio runtime.
    #[cfg(feature = "async")]
    pub async fn connect_async(&self, addr: &str) -> Result<tokio::net::TcpStream> {
        let candidates: Vec<SocketAddr> = tokio::net::lookup_host(addr)
            .await
            .map_err(|source| TransportError::Resolve {
                addr: addr.to_string(),
                source,
            })?
            .collect();
        if candidates.is_empty() {
            return Err(TransportError::NoAddresses {
                addr: addr.to_string(),
            });
        }

        let mut last_err = None;
        for candidate in candidates {
            let attempt = match self.connect_timeout {
                Some(timeout) => {
                    match tokio::time::timeout(timeout, tokio::net::TcpStream::connect(candidate))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(std::io::Error::new(
                            std::io::ErrorKind::TimedOut,
                            format!("connect timed out after {timeout:?}"),
                        )),
                    }
                }
                None => tokio::net::TcpStream::connect(candidate).await,
            };
            match attempt {
                Ok(stream) => {
                    stream.set_nodelay(self.nodelay)?;
                    info!(addr, peer = %candidate, "connected");
                    return Ok(stream);
                }
                Err(err) => {
                    debug!(addr, peer = %candidate, error = %err, "connect attempt failed");
                    last_err = Some(err);
                }
            }
        }

        Err(TransportError::Connect {
            addr: addr.to_string(),
            source: last_err.unwrap_or_else(|| std::io::Error::other("no address attempted")),
        })
    }
}

fn resolve(addr: &str) -> Result<Vec<SocketAddr>> {
    let candidates: Vec<SocketAddr> = addr
        .to_socket_addrs()
        .map_err(|source| TransportError::Resolve {
            addr: addr.to_string(),
            source,
        })?
        .collect();
    if candidates.is_empty() {
        return Err(TransportError::NoAddresses {
            addr: addr.to_string(),
        });
    }
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;

    use super::*;

    #[test]
    fn connect_to_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let handle = std::thread::spawn(move || {
            let mut client = TcpConnector::new().connect(&addr).unwrap();
            client.write_all(b"hello").unwrap();
        });

        let (mut server, _) = listener.accept().unwrap();
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        handle.join().unwrap();
    }

    #[test]
    fn nodelay_is_applied() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let stream = TcpConnector::new().with_nodelay(true).connect(&addr).unwrap();
        assert!(stream.get_ref().nodelay().unwrap());
    }

    #[test]
    fn refused_connection_reports_connect_error() {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().to_string()
        };

        let err = TcpConnector::new()
            .with_connect_timeout(Some(Duration::from_millis(500)))
            .connect(&addr)
            .unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
        assert!(err.io_source().is_some());
    }

    #[test]
    fn unresolvable_address_reports_resolve_error() {
        let err = TcpConnector::new().connect("missing-port").unwrap_err();
        assert!(matches!(err, TransportError::Resolve { .. }));
    }

    #[test]
    fn builder_sets_timeout() {
        let connector = TcpConnector::new().with_connect_timeout(None);
        assert_eq!(connector.connect_timeout(), None);
        assert_eq!(
            TcpConnector::default().connect_timeout(),
            Some(DEFAULT_CONNECT_TIMEOUT)
        );
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn connect_async_to_listener() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4];
            socket.read_exact(&mut buf).await.unwrap();
            buf
        });

        let mut client = TcpConnector::new().connect_async(&addr).await.unwrap();
        client.write_all(b"ping").await.unwrap();

        assert_eq!(&server.await.unwrap(), b"ping");
    }
}
