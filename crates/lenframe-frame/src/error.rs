use std::fmt;
use std::io::ErrorKind;

/// Which part of a frame was being transferred when an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStage {
    /// The 2-byte length prefix.
    Prefix,
    /// The message body.
    Body,
}

impl fmt::Display for FrameStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameStage::Prefix => f.write_str("prefix"),
            FrameStage::Body => f.write_str("body"),
        }
    }
}

/// Why an operation was abandoned before completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// A read or write timeout elapsed.
    TimedOut,
    /// The caller cancelled the operation.
    Requested,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::TimedOut => f.write_str("timed out"),
            CancelReason::Requested => f.write_str("cancelled by caller"),
        }
    }
}

/// Errors that can occur while sending or receiving framed messages.
#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    /// The message does not fit the 16-bit length prefix (or the configured limit).
    #[error("message too large ({size} bytes, max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// The stream ended before a complete frame was received.
    #[error("connection closed mid-{stage} ({received} of {expected} bytes)")]
    ConnectionClosed {
        stage: FrameStage,
        received: usize,
        expected: usize,
    },

    /// The transport failed while reading.
    #[error("stream read error: {0}")]
    StreamRead(#[source] std::io::Error),

    /// The transport failed while writing.
    #[error("stream write error: {0}")]
    StreamWrite(#[source] std::io::Error),

    /// The operation was abandoned; the stream position is now unknown.
    #[error("operation {0}")]
    Cancelled(CancelReason),

    /// A previous failure left the channel unusable.
    #[error("channel is poisoned by an earlier failure")]
    Poisoned,

    /// Configuring the underlying transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] lenframe_transport::TransportError),

    /// An I/O error from a codec-driven stream, where the direction is not known.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FramingError {
    /// Classify an error returned by a blocking read.
    ///
    /// Socket read timeouts surface as `WouldBlock` or `TimedOut`.
    pub(crate) fn from_read(err: std::io::Error) -> Self {
        match err.kind() {
            ErrorKind::WouldBlock | ErrorKind::TimedOut => {
                FramingError::Cancelled(CancelReason::TimedOut)
            }
            _ => FramingError::StreamRead(err),
        }
    }

    /// Classify an error returned by a blocking write or flush.
    pub(crate) fn from_write(err: std::io::Error) -> Self {
        match err.kind() {
            ErrorKind::WouldBlock | ErrorKind::TimedOut => {
                FramingError::Cancelled(CancelReason::TimedOut)
            }
            _ => FramingError::StreamWrite(err),
        }
    }

    /// True when the peer closed the stream cleanly between frames.
    pub fn is_clean_close(&self) -> bool {
        matches!(
            self,
            FramingError::ConnectionClosed {
                stage: FrameStage::Prefix,
                received: 0,
                ..
            }
        )
    }

    /// True for the caller-requested or timed-out abort.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FramingError::Cancelled(_))
    }
}

pub type Result<T> = std::result::Result<T, FramingError>;
