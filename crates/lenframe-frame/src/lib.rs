//! Length-prefixed message framing over byte streams.
//!
//! This is the core layer of lenframe. Every message is framed with a 2-byte
//! big-endian length prefix followed by exactly that many body bytes. There is
//! no magic number, version field or checksum; both ends must agree on this
//! framing out of band.
//!
//! Receives are always sized by the prefix on the wire, never by the size of
//! the request that preceded them. No partial reads reach the caller.

pub mod cancel;
pub mod channel;
pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_channel;
#[cfg(feature = "async")]
pub mod tokio_codec;

pub use cancel::CancelHandle;
pub use channel::FramedChannel;
pub use codec::{
    decode_frame, encode_frame, encode_prefix, FrameConfig, MAX_MESSAGE_SIZE, PREFIX_SIZE,
};
pub use error::{CancelReason, FrameStage, FramingError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;

#[cfg(feature = "async")]
pub use async_channel::AsyncFramedChannel;
#[cfg(feature = "async")]
pub use tokio_codec::LengthPrefixCodec;
#[cfg(feature = "async")]
pub use tokio_util::sync::CancellationToken;
