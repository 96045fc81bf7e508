use std::fmt;
use std::io;

use lenframe_frame::FramingError;
use lenframe_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => USAGE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

/// Exit code for a socket-level failure.
fn socket_code(err: &io::Error) -> i32 {
    match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof => FAILURE,
        _ => TRANSPORT_ERROR,
    }
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    let code = match &err {
        TransportError::Connect { source, .. } | TransportError::Io(source) => {
            match source.kind() {
                io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
                _ => TRANSPORT_ERROR,
            }
        }
        TransportError::Resolve { .. } | TransportError::NoAddresses { .. } => TRANSPORT_ERROR,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn framing_error(context: &str, err: FramingError) -> CliError {
    let code = match &err {
        FramingError::MessageTooLarge { .. } => DATA_INVALID,
        FramingError::ConnectionClosed { .. } => FAILURE,
        FramingError::Cancelled(_) => TIMEOUT,
        FramingError::StreamRead(source) | FramingError::StreamWrite(source) => {
            socket_code(source)
        }
        FramingError::Transport(_) => TRANSPORT_ERROR,
        FramingError::Poisoned | FramingError::Io(_) => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}
