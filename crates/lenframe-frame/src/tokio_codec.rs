//! `tokio_util::codec` adapter for the 2-byte big-endian framing.
//!
//! Use with `Framed`, `FramedRead` or `FramedWrite` when the caller wants a
//! `Stream`/`Sink` of messages instead of a request/response channel.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_frame, encode_frame, incomplete_frame, MAX_MESSAGE_SIZE};
use crate::error::FramingError;

/// Length-prefix codec: 2-byte big-endian length, then the body.
#[derive(Debug, Clone)]
pub struct LengthPrefixCodec {
    max_message_size: usize,
}

impl LengthPrefixCodec {
    /// Codec accepting messages up to 65535 bytes.
    pub fn new() -> Self {
        Self {
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }

    /// Codec with a lower message limit (clamped to 65535).
    pub fn with_max_message_size(max_message_size: usize) -> Self {
        Self {
            max_message_size: max_message_size.min(MAX_MESSAGE_SIZE),
        }
    }

    /// The message limit enforced in both directions.
    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }
}

impl Default for LengthPrefixCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LengthPrefixCodec {
    type Item = Bytes;
    type Error = FramingError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, FramingError> {
        decode_frame(src, self.max_message_size)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, FramingError> {
        match self.decode(src)? {
            Some(message) => Ok(Some(message)),
            None if src.is_empty() => Ok(None),
            None => Err(incomplete_frame(src)),
        }
    }
}

impl Encoder<Bytes> for LengthPrefixCodec {
    type Error = FramingError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), FramingError> {
        Encoder::<&[u8]>::encode(self, item.as_ref(), dst)
    }
}

impl<'a> Encoder<&'a [u8]> for LengthPrefixCodec {
    type Error = FramingError;

    fn encode(&mut self, item: &'a [u8], dst: &mut BytesMut) -> Result<(), FramingError> {
        if item.len() > self.max_message_size {
            return Err(FramingError::MessageTooLarge {
                size: item.len(),
                max: self.max_message_size,
            });
        }
        encode_frame(item, dst)
    }
}
