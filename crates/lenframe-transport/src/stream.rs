use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use tracing::debug;

use crate::error::Result;

/// A connected TCP stream implementing `Read` and `Write`.
///
/// This is the I/O type returned by [`crate::TcpConnector::connect`]. It owns
/// the socket; dropping it closes the connection.
pub struct NetStream {
    inner: TcpStream,
}

impl Read for NetStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for NetStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl From<TcpStream> for NetStream {
    fn from(inner: TcpStream) -> Self {
        Self { inner }
    }
}

impl NetStream {
    /// Set read timeout on the underlying socket.
    ///
    /// A blocking read that exceeds the timeout fails with `WouldBlock` or
    /// `TimedOut`, depending on the platform.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_read_timeout(timeout).map_err(Into::into)
    }

    /// Set write timeout on the underlying socket.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_write_timeout(timeout).map_err(Into::into)
    }

    /// Enable or disable Nagle's algorithm.
    pub fn set_nodelay(&self, nodelay: bool) -> Result<()> {
        self.inner.set_nodelay(nodelay).map_err(Into::into)
    }

    /// Try to clone this stream (creates a new file descriptor for the same socket).
    pub fn try_clone(&self) -> Result<Self> {
        let cloned = self.inner.try_clone()?;
        Ok(Self { inner: cloned })
    }

    /// Address of the remote end.
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        self.inner.peer_addr().map_err(Into::into)
    }

    /// Address of the local end.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.inner.local_addr().map_err(Into::into)
    }

    /// Shut down one or both directions of the connection.
    ///
    /// `NotConnected` is ignored: the peer already tore the connection down.
    pub fn shutdown(&self, how: Shutdown) -> Result<()> {
        match self.inner.shutdown(how) {
            Ok(()) => {
                debug!(?how, "stream shut down");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Borrow the underlying socket.
    pub fn get_ref(&self) -> &TcpStream {
        &self.inner
    }

    /// Consume the wrapper and return the underlying socket.
    pub fn into_inner(self) -> TcpStream {
        self.inner
    }
}

impl std::fmt::Debug for NetStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetStream")
            .field("type", &"tcp")
            .field("peer", &self.inner.peer_addr().ok())
            .finish()
    }
}
