use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameStage, FramingError, Result};

/// Length prefix: 2 bytes, big-endian.
pub const PREFIX_SIZE: usize = 2;

/// Largest message the 16-bit prefix can describe.
pub const MAX_MESSAGE_SIZE: usize = u16::MAX as usize;

/// Encode the length prefix for a message of `len` bytes.
pub fn encode_prefix(len: usize) -> Result<[u8; PREFIX_SIZE]> {
    let len = u16::try_from(len).map_err(|_| FramingError::MessageTooLarge {
        size: len,
        max: MAX_MESSAGE_SIZE,
    })?;
    Ok(len.to_be_bytes())
}

/// Encode a message into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────────────┬──────────────────┐
/// │ Length (2B BE) │ Body             │
/// │ 0x0000-0xFFFF  │ (Length bytes)   │
/// └────────────────┴──────────────────┘
/// ```
///
/// Nothing is written to `dst` when the message is too large.
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let prefix = encode_prefix(payload.len())?;
    dst.reserve(PREFIX_SIZE + payload.len());
    dst.put_slice(&prefix);
    dst.put_slice(payload);
    Ok(())
}

/// Decode a message from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_message_size: usize) -> Result<Option<Bytes>> {
    if src.len() < PREFIX_SIZE {
        return Ok(None);
    }

    let len = usize::from(u16::from_be_bytes([src[0], src[1]]));
    if len > max_message_size {
        return Err(FramingError::MessageTooLarge {
            size: len,
            max: max_message_size,
        });
    }

    if src.len() < PREFIX_SIZE + len {
        src.reserve(PREFIX_SIZE + len - src.len());
        return Ok(None);
    }

    src.advance(PREFIX_SIZE);
    Ok(Some(src.split_to(len).freeze()))
}

/// Describe how far an incomplete buffer got, for end-of-stream reporting.
#[cfg_attr(not(feature = "async"), allow(dead_code))]
pub(crate) fn incomplete_frame(src: &[u8]) -> FramingError {
    if src.len() < PREFIX_SIZE {
        return FramingError::ConnectionClosed {
            stage: FrameStage::Prefix,
            received: src.len(),
            expected: PREFIX_SIZE,
        };
    }
    FramingError::ConnectionClosed {
        stage: FrameStage::Body,
        received: src.len() - PREFIX_SIZE,
        expected: usize::from(u16::from_be_bytes([src[0], src[1]])),
    }
}

/// Configuration for framed channels.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum message size in bytes. Default and ceiling: 65535.
    pub max_message_size: usize,
    /// Read timeout for receive operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for send operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl FrameConfig {
    /// The effective limit: the configured maximum, clamped to what the prefix can express.
    pub fn message_limit(&self) -> usize {
        self.max_message_size.min(MAX_MESSAGE_SIZE)
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_message_size: MAX_MESSAGE_SIZE,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hi_encodes_to_known_bytes() {
        let mut buf = BytesMut::new();
        encode_frame(b"hi", &mut buf).unwrap();
        assert_eq!(buf.as_ref(), &[0x00, 0x02, 0x68, 0x69]);

        let message = decode_frame(&mut buf, MAX_MESSAGE_SIZE).unwrap().unwrap();
        assert_eq!(message.as_ref(), &[0x68, 0x69]);
        assert!(buf.is_empty());
    }

    #[test]
    fn empty_message_is_two_zero_bytes() {
        let mut buf = BytesMut::new();
        encode_frame(b"", &mut buf).unwrap();
        assert_eq!(buf.as_ref(), &[0x00, 0x00]);

        let message = decode_frame(&mut buf, MAX_MESSAGE_SIZE).unwrap().unwrap();
        assert!(message.is_empty());
    }

    #[test]
    fn max_message_uses_full_prefix() {
        let payload = vec![0x5A; MAX_MESSAGE_SIZE];
        let mut buf = BytesMut::new();
        encode_frame(&payload, &mut buf).unwrap();

        assert_eq!(&buf[..PREFIX_SIZE], &[0xFF, 0xFF]);
        assert_eq!(buf.len(), PREFIX_SIZE + MAX_MESSAGE_SIZE);
    }

    #[test]
    fn oversized_message_rejected_without_output() {
        let payload = vec![0u8; MAX_MESSAGE_SIZE + 1];
        let mut buf = BytesMut::new();

        let err = encode_frame(&payload, &mut buf).unwrap_err();
        assert!(matches!(
            err,
            FramingError::MessageTooLarge {
                size: 65536,
                max: 65535
            }
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_incomplete_prefix() {
        let mut buf = BytesMut::from(&[0x00][..]);
        assert!(decode_frame(&mut buf, MAX_MESSAGE_SIZE).unwrap().is_none());
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn decode_incomplete_body() {
        let mut buf = BytesMut::new();
        encode_frame(b"hello", &mut buf).unwrap();
        buf.truncate(PREFIX_SIZE + 2);

        assert!(decode_frame(&mut buf, MAX_MESSAGE_SIZE).unwrap().is_none());
        assert_eq!(buf.len(), PREFIX_SIZE + 2);
    }

    #[test]
    fn decode_rejects_prefix_above_limit() {
        let mut buf = BytesMut::from(&[0x01, 0x00][..]);
        let err = decode_frame(&mut buf, 16).unwrap_err();
        assert!(matches!(
            err,
            FramingError::MessageTooLarge { size: 256, max: 16 }
        ));
    }

    #[test]
    fn multiple_frames_in_one_buffer() {
        let mut buf = BytesMut::new();
        encode_frame(b"first", &mut buf).unwrap();
        encode_frame(b"second", &mut buf).unwrap();

        let first = decode_frame(&mut buf, MAX_MESSAGE_SIZE).unwrap().unwrap();
        let second = decode_frame(&mut buf, MAX_MESSAGE_SIZE).unwrap().unwrap();
        assert_eq!(first.as_ref(), b"first");
        assert_eq!(second.as_ref(), b"second");
        assert!(buf.is_empty());
    }

    #[test]
    fn incomplete_frame_reports_stage() {
        let err = incomplete_frame(&[0x00]);
        assert!(matches!(
            err,
            FramingError::ConnectionClosed {
                stage: FrameStage::Prefix,
                received: 1,
                expected: 2
            }
        ));

        let err = incomplete_frame(&[0x00, 0x05, b'a', b'b']);
        assert!(matches!(
            err,
            FramingError::ConnectionClosed {
                stage: FrameStage::Body,
                received: 2,
                expected: 5
            }
        ));
    }

    #[test]
    fn config_limit_is_clamped() {
        let cfg = FrameConfig {
            max_message_size: usize::MAX,
            ..FrameConfig::default()
        };
        assert_eq!(cfg.message_limit(), MAX_MESSAGE_SIZE);
        assert_eq!(FrameConfig::default().message_limit(), MAX_MESSAGE_SIZE);
    }
}
