//! TCP stream transport.
//!
//! This is the lowest layer of lenframe: it turns an address into a connected,
//! bidirectional byte stream. Framing is built on top of the [`NetStream`]
//! type provided here; nothing in this crate knows about message boundaries.

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use stream::NetStream;
pub use tcp::{TcpConnector, DEFAULT_CONNECT_TIMEOUT};
