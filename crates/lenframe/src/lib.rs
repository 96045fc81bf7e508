//! Length-prefixed request/response messaging over TCP.
//!
//! Every message on the wire is a 2-byte big-endian length followed by that
//! many bytes of body. A client connects, sends one message, and reads back
//! one message sized by the prefix the peer sends.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP connection setup and the [`transport::NetStream`] wrapper
//! - [`frame`]: the framing layer ([`frame::FramedChannel`] and friends)
//!
//! ```no_run
//! use lenframe::frame::{FrameConfig, FramedChannel};
//! use lenframe::transport::TcpConnector;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let stream = TcpConnector::new().connect("127.0.0.1:2347")?;
//! let mut channel = FramedChannel::with_config_net(stream, FrameConfig::default())?;
//! let reply = channel.request(b"hi")?;
//! println!("{} bytes back", reply.len());
//! channel.close()?;
//! # Ok(())
//! # }
//! ```

/// Re-export transport types.
pub mod transport {
    pub use lenframe_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use lenframe_frame::*;
}
