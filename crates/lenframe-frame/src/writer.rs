use std::io::{ErrorKind, Write};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use bytes::BytesMut;
use lenframe_transport::NetStream;
use tracing::{debug, trace};

use crate::cancel::{attribute, ensure_not_cancelled, CancelHandle};
use crate::codec::{encode_frame, FrameConfig};
use crate::error::{FramingError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete messages to any `Write` stream.
///
/// Prefix and body go out as one buffer and the write loops until every byte
/// is accepted. A failure part-way through poisons the writer: the peer may
/// hold a truncated frame, so the stream cannot carry further messages.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
    poisoned: bool,
    cancelled: Arc<AtomicBool>,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self::from_parts(inner, config, false, Arc::default())
    }

    /// Encode and send a message (blocking).
    ///
    /// Oversized messages are rejected before any I/O and do not poison the writer.
    pub fn send(&mut self, message: &[u8]) -> Result<()> {
        if self.poisoned {
            return Err(FramingError::Poisoned);
        }
        encode_checked(message, self.config.message_limit(), &mut self.buf)?;

        let result = ensure_not_cancelled(&self.cancelled)
            .and_then(|()| write_frame_bytes(&mut self.inner, &self.buf));
        if let Err(err) = result {
            let err = attribute(&self.cancelled, err);
            self.poisoned = true;
            debug!(error = %err, "write half poisoned");
            return Err(err);
        }
        trace!(size = message.len(), "sent frame");
        Ok(())
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        flush_stream(&mut self.inner)
    }

    /// Whether an earlier failure left this writer unusable.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum message size for subsequent sends.
    pub fn set_max_message_size(&mut self, max_message_size: usize) {
        self.config.max_message_size = max_message_size;
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    pub(crate) fn from_parts(
        inner: T,
        config: FrameConfig,
        poisoned: bool,
        cancelled: Arc<AtomicBool>,
    ) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
            poisoned,
            cancelled,
        }
    }
}

impl FrameWriter<NetStream> {
    /// Create a frame writer for `NetStream` and apply write timeout from config.
    pub fn with_config_net(inner: NetStream, config: FrameConfig) -> Result<Self> {
        inner.set_write_timeout(config.write_timeout)?;
        Ok(Self::with_config(inner, config))
    }

    /// Handle that aborts a blocked [`send`](FrameWriter::send) from another thread.
    pub fn cancel_handle(&self) -> Result<CancelHandle> {
        Ok(CancelHandle::new(self.cancelled.clone(), self.inner.try_clone()?))
    }
}

/// Replace `buf` with the encoded frame, enforcing `limit` before anything is written.
pub(crate) fn encode_checked(message: &[u8], limit: usize, buf: &mut BytesMut) -> Result<()> {
    if message.len() > limit {
        return Err(FramingError::MessageTooLarge {
            size: message.len(),
            max: limit,
        });
    }
    buf.clear();
    encode_frame(message, buf)
}

/// Write an encoded frame in full, then flush.
pub(crate) fn write_frame_bytes<T: Write>(inner: &mut T, bytes: &[u8]) -> Result<()> {
    let mut offset = 0usize;
    while offset < bytes.len() {
        match inner.write(&bytes[offset..]) {
            Ok(0) => {
                return Err(FramingError::StreamWrite(std::io::Error::from(
                    ErrorKind::WriteZero,
                )))
            }
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(FramingError::from_write(err)),
        }
    }
    flush_stream(inner)
}

pub(crate) fn flush_stream<T: Write>(inner: &mut T) -> Result<()> {
    loop {
        match inner.flush() {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(FramingError::from_write(err)),
        }
    }
}
