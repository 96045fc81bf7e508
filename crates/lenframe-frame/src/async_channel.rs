//! Awaitable framed channel for tokio streams.
//!
//! Same wire format and failure rules as [`crate::FramedChannel`]: reads are
//! sized by the prefix, writes loop until complete, and any failure poisons
//! the channel. Timeouts come from [`FrameConfig`]; caller cancellation comes
//! from a [`CancellationToken`]. Dropping an in-flight future leaves the
//! channel poisoned, the same as cancelling it.

use std::future::Future;
use std::io::ErrorKind;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::codec::{FrameConfig, PREFIX_SIZE};
use crate::error::{CancelReason, FrameStage, FramingError, Result};
use crate::writer::encode_checked;

/// Sends and receives length-prefixed messages over an owned tokio stream.
///
/// `send*` needs `S: AsyncWrite`, `receive*` needs `S: AsyncRead`, so the
/// halves returned by [`AsyncFramedChannel::split`] each expose one direction.
pub struct AsyncFramedChannel<S> {
    stream: S,
    buf: BytesMut,
    config: FrameConfig,
    poisoned: bool,
}

impl<S> AsyncFramedChannel<S> {
    /// Wrap a connected stream with default configuration.
    pub fn wrap(stream: S) -> Self {
        Self::with_config(stream, FrameConfig::default())
    }

    /// Wrap a connected stream; `read_timeout`/`write_timeout` bound each operation.
    pub fn with_config(stream: S, config: FrameConfig) -> Self {
        Self {
            stream,
            buf: BytesMut::new(),
            config,
            poisoned: false,
        }
    }

    /// Whether an earlier failure or cancellation left this channel unusable.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Release the stream without flushing.
    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Current channel configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.poisoned {
            return Err(FramingError::Poisoned);
        }
        Ok(())
    }

    /// Mark the channel poisoned until the frame in flight completes.
    fn begin(&mut self) {
        self.poisoned = true;
    }

    fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => self.poisoned = false,
            Err(err) if err.is_clean_close() => {
                debug!("peer closed the connection");
            }
            Err(err) => warn!(error = %err, "channel poisoned"),
        }
        result
    }
}

impl<S: AsyncRead + AsyncWrite> AsyncFramedChannel<S> {
    /// Split into a receive-only and a send-only channel.
    ///
    /// One send and one receive may then be in flight at the same time.
    pub fn split(self) -> (AsyncFramedChannel<ReadHalf<S>>, AsyncFramedChannel<WriteHalf<S>>) {
        let (read, write) = tokio::io::split(self.stream);
        let reader = AsyncFramedChannel {
            stream: read,
            buf: BytesMut::new(),
            config: self.config.clone(),
            poisoned: self.poisoned,
        };
        let writer = AsyncFramedChannel {
            stream: write,
            buf: self.buf,
            config: self.config,
            poisoned: self.poisoned,
        };
        (reader, writer)
    }
}

impl<S: AsyncWrite + Unpin> AsyncFramedChannel<S> {
    /// Send one message.
    pub async fn send(&mut self, message: &[u8]) -> Result<()> {
        self.send_inner(message, None).await
    }

    /// Send one message, abandoning it if `cancel` fires first.
    pub async fn send_cancellable(
        &mut self,
        message: &[u8],
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.send_inner(message, Some(cancel)).await
    }

    /// Shut down the write direction and release the stream.
    ///
    /// A poisoned channel is released without shutting down.
    pub async fn close(mut self) -> Result<()> {
        if !self.poisoned {
            self.stream
                .shutdown()
                .await
                .map_err(FramingError::StreamWrite)?;
        }
        debug!(poisoned = self.poisoned, "channel closed");
        Ok(())
    }

    async fn send_inner(&mut self, message: &[u8], cancel: Option<&CancellationToken>) -> Result<()> {
        self.ensure_usable()?;
        encode_checked(message, self.config.message_limit(), &mut self.buf)?;

        let timeout = self.config.write_timeout;
        self.begin();
        let result = guarded(write_frame_async(&mut self.stream, &self.buf), timeout, cancel).await;
        self.settle(result)
    }
}

impl<S: AsyncRead + Unpin> AsyncFramedChannel<S> {
    /// Receive one message, sized by its own length prefix.
    pub async fn receive(&mut self) -> Result<Bytes> {
        self.receive_inner(None).await
    }

    /// Receive one message, abandoning it if `cancel` fires first.
    pub async fn receive_cancellable(&mut self, cancel: &CancellationToken) -> Result<Bytes> {
        self.receive_inner(Some(cancel)).await
    }

    async fn receive_inner(&mut self, cancel: Option<&CancellationToken>) -> Result<Bytes> {
        self.ensure_usable()?;
        let limit = self.config.message_limit();
        let timeout = self.config.read_timeout;
        self.begin();
        let result = guarded(read_message_async(&mut self.stream, limit), timeout, cancel).await;
        self.settle(result)
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> AsyncFramedChannel<S> {
    /// Send a message and wait for the peer's reply.
    pub async fn request(&mut self, message: &[u8]) -> Result<Bytes> {
        self.send(message).await?;
        self.receive().await
    }
}

/// Run `op` under an optional timeout and an optional cancellation token.
async fn guarded<T, F>(
    op: F,
    timeout: Option<Duration>,
    cancel: Option<&CancellationToken>,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let timed = async move {
        match timeout {
            Some(limit) => match tokio::time::timeout(limit, op).await {
                Ok(result) => result,
                Err(_) => Err(FramingError::Cancelled(CancelReason::TimedOut)),
            },
            None => op.await,
        }
    };

    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(FramingError::Cancelled(CancelReason::Requested)),
            result = timed => result,
        },
        None => timed.await,
    }
}

async fn read_message_async<T: AsyncRead + Unpin>(
    inner: &mut T,
    max_message_size: usize,
) -> Result<Bytes> {
    let mut prefix = [0u8; PREFIX_SIZE];
    read_full_async(inner, &mut prefix, FrameStage::Prefix).await?;

    let len = usize::from(u16::from_be_bytes(prefix));
    if len > max_message_size {
        return Err(FramingError::MessageTooLarge {
            size: len,
            max: max_message_size,
        });
    }

    let mut body = BytesMut::zeroed(len);
    read_full_async(inner, &mut body, FrameStage::Body).await?;
    Ok(body.freeze())
}

async fn read_full_async<T: AsyncRead + Unpin>(
    inner: &mut T,
    buf: &mut [u8],
    stage: FrameStage,
) -> Result<()> {
    let mut filled = 0usize;
    while filled < buf.len() {
        match inner.read(&mut buf[filled..]).await {
            Ok(0) => {
                return Err(FramingError::ConnectionClosed {
                    stage,
                    received: filled,
                    expected: buf.len(),
                })
            }
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(FramingError::StreamRead(err)),
        }
    }
    Ok(())
}

async fn write_frame_async<T: AsyncWrite + Unpin>(inner: &mut T, bytes: &[u8]) -> Result<()> {
    let mut offset = 0usize;
    while offset < bytes.len() {
        match inner.write(&bytes[offset..]).await {
            Ok(0) => {
                return Err(FramingError::StreamWrite(std::io::Error::from(
                    ErrorKind::WriteZero,
                )))
            }
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(FramingError::StreamWrite(err)),
        }
    }
    inner.flush().await.map_err(FramingError::StreamWrite)
}
