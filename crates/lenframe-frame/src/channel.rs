//! A framed channel over one bidirectional stream.
//!
//! `send` and `receive` take `&mut self`, so two sends (or two receives) can
//! never overlap on the same channel. To run one send and one receive at the
//! same time, [`FramedChannel::split`] the channel into a [`FrameReader`] and a
//! [`FrameWriter`] and move them to separate threads.

use std::io::{Read, Write};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use lenframe_transport::NetStream;
use tracing::{debug, warn};

use crate::cancel::{attribute, ensure_not_cancelled, CancelHandle};
use crate::codec::FrameConfig;
use crate::error::{FramingError, Result};
use crate::reader::{read_message, FrameReader};
use crate::writer::{encode_checked, flush_stream, write_frame_bytes, FrameWriter};

/// Sends and receives length-prefixed messages over an owned stream.
///
/// The channel owns the stream for its whole lifetime. Dropping the channel,
/// calling [`close`](Self::close) or [`into_inner`](Self::into_inner)
/// releases it. Once any transfer fails, the channel is poisoned and every
/// later call returns [`FramingError::Poisoned`].
#[derive(Debug)]
pub struct FramedChannel<S> {
    stream: S,
    buf: BytesMut,
    config: FrameConfig,
    poisoned: bool,
    cancelled: Arc<AtomicBool>,
}

impl<S: Read + Write> FramedChannel<S> {
    /// Wrap a connected stream with default configuration.
    pub fn wrap(stream: S) -> Self {
        Self::with_config(stream, FrameConfig::default())
    }

    /// Wrap a connected stream with explicit configuration.
    ///
    /// Timeouts in `config` are not applied to arbitrary streams; use
    /// [`FramedChannel::with_config_net`] for TCP streams.
    pub fn with_config(stream: S, config: FrameConfig) -> Self {
        Self {
            stream,
            buf: BytesMut::new(),
            config,
            poisoned: false,
            cancelled: Arc::default(),
        }
    }

    /// Send one message (blocking).
    ///
    /// A message longer than the limit fails with `MessageTooLarge` before
    /// any I/O and leaves the channel usable.
    pub fn send(&mut self, message: &[u8]) -> Result<()> {
        self.ensure_usable()?;
        encode_checked(message, self.config.message_limit(), &mut self.buf)?;

        let result = write_frame_bytes(&mut self.stream, &self.buf);
        self.settle(result)
    }

    /// Receive one message (blocking), sized by its own length prefix.
    pub fn receive(&mut self) -> Result<Bytes> {
        self.ensure_usable()?;
        let result = read_message(&mut self.stream, self.config.message_limit());
        self.settle(result)
    }

    /// Send a message and wait for the peer's reply.
    pub fn request(&mut self, message: &[u8]) -> Result<Bytes> {
        self.send(message)?;
        self.receive()
    }

    /// Flush pending output and release the stream.
    ///
    /// A poisoned channel is released without flushing.
    pub fn close(mut self) -> Result<()> {
        if !self.poisoned {
            flush_stream(&mut self.stream)?;
        }
        debug!(poisoned = self.poisoned, "channel closed");
        Ok(())
    }

    /// Whether an earlier failure left this channel unusable.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Mutably borrow the underlying stream.
    ///
    /// Reading or writing through this reference desynchronises the framing.
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

    fn ensure_usable(&mut self) -> Result<()> {
        if self.poisoned {
            return Err(FramingError::Poisoned);
        }
        let ready = ensure_not_cancelled(&self.cancelled);
        self.settle(ready)
    }

    fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        let err = match result {
            Ok(value) => return Ok(value),
            Err(err) => attribute(&self.cancelled, err),
        };
        self.poisoned = true;
        if err.is_clean_close() {
            debug!("peer closed the connection");
        } else {
            warn!(error = %err, "channel poisoned");
        }
        Err(err)
    }
}

impl FramedChannel<NetStream> {
    /// Wrap a TCP stream and apply the read and write timeouts from config.
    ///
    /// An elapsed timeout surfaces as `Cancelled(TimedOut)` and poisons the channel.
    pub fn with_config_net(stream: NetStream, config: FrameConfig) -> Result<Self> {
        stream.set_read_timeout(config.read_timeout)?;
        stream.set_write_timeout(config.write_timeout)?;
        Ok(Self::with_config(stream, config))
    }

    /// Handle that aborts a blocked `send`/`receive` from another thread.
    ///
    /// The aborted call fails with `Cancelled(Requested)` and poisons the
    /// channel. The handle stays bound to both halves after [`split`](Self::split).
    pub fn cancel_handle(&self) -> Result<CancelHandle> {
        Ok(CancelHandle::new(self.cancelled.clone(), self.stream.try_clone()?))
    }

    /// Split into independent halves over clones of the same socket.
    ///
    /// Both halves inherit the configuration, the poisoned state and the
    /// cancellation flag.
    pub fn split(self) -> Result<(FrameReader<NetStream>, FrameWriter<NetStream>)> {
        let read_stream = self.stream.try_clone()?;
        let reader = FrameReader::from_parts(
            read_stream,
            self.config.clone(),
            self.poisoned,
            self.cancelled.clone(),
        );
        let writer =
            FrameWriter::from_parts(self.stream, self.config, self.poisoned, self.cancelled);
        Ok((reader, writer))
    }
}
