use std::io::{ErrorKind, Read};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use lenframe_transport::NetStream;
use tracing::{debug, trace};

use crate::cancel::{attribute, ensure_not_cancelled, CancelHandle};
use crate::codec::{FrameConfig, PREFIX_SIZE};
use crate::error::{FrameStage, FramingError, Result};

/// Reads complete messages from any `Read` stream.
///
/// Reads exactly the 2-byte prefix, then exactly the declared number of body
/// bytes. Nothing past the current frame is consumed from the stream, so the
/// reader can be unwrapped between messages without losing data.
///
/// Any failure poisons the reader; later calls return [`FramingError::Poisoned`].
pub struct FrameReader<T> {
    inner: T,
    config: FrameConfig,
    poisoned: bool,
    cancelled: Arc<AtomicBool>,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self::from_parts(inner, config, false, Arc::default())
    }

    /// Read the next complete message (blocking).
    ///
    /// Returns `Err(FramingError::ConnectionClosed)` when the stream ends
    /// before a full frame arrives.
    pub fn receive(&mut self) -> Result<Bytes> {
        if self.poisoned {
            return Err(FramingError::Poisoned);
        }
        let result = ensure_not_cancelled(&self.cancelled)
            .and_then(|()| read_message(&mut self.inner, self.config.message_limit()));
        match result {
            Ok(message) => Ok(message),
            Err(err) => {
                let err = attribute(&self.cancelled, err);
                self.poisoned = true;
                debug!(error = %err, "read half poisoned");
                Err(err)
            }
        }
    }

    /// Whether an earlier failure left this reader unusable.
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

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum message size for subsequent receives.
    pub fn set_max_message_size(&mut self, max_message_size: usize) {
        self.config.max_message_size = max_message_size;
    }

    /// Current frame reader configuration.
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
            config,
            poisoned,
            cancelled,
        }
    }
}

impl FrameReader<NetStream> {
    /// Create a frame reader for `NetStream` and apply read timeout from config.
    pub fn with_config_net(inner: NetStream, config: FrameConfig) -> Result<Self> {
        inner.set_read_timeout(config.read_timeout)?;
        Ok(Self::with_config(inner, config))
    }

    /// Handle that aborts a blocked [`receive`](FrameReader::receive) from another thread.
    pub fn cancel_handle(&self) -> Result<CancelHandle> {
        Ok(CancelHandle::new(self.cancelled.clone(), self.inner.try_clone()?))
    }
}

/// Read one frame: exactly the prefix, then exactly the declared body.
pub(crate) fn read_message<T: Read>(inner: &mut T, max_message_size: usize) -> Result<Bytes> {
    let mut prefix = [0u8; PREFIX_SIZE];
    read_full(inner, &mut prefix, FrameStage::Prefix)?;

    let len = usize::from(u16::from_be_bytes(prefix));
    if len > max_message_size {
        return Err(FramingError::MessageTooLarge {
            size: len,
            max: max_message_size,
        });
    }

    let mut body = BytesMut::zeroed(len);
    read_full(inner, &mut body, FrameStage::Body)?;
    trace!(size = len, "received frame");
    Ok(body.freeze())
}

fn read_full<T: Read>(inner: &mut T, buf: &mut [u8], stage: FrameStage) -> Result<()> {
    let mut filled = 0usize;
    while filled < buf.len() {
        match inner.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(FramingError::ConnectionClosed {
                    stage,
                    received: filled,
                    expected: buf.len(),
                })
            }
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(FramingError::from_read(err)),
        }
    }
    Ok(())
}
