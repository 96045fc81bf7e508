/// Errors that can occur while establishing or driving a TCP stream.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The address could not be resolved.
    #[error("failed to resolve {addr}: {source}")]
    Resolve {
        addr: String,
        source: std::io::Error,
    },

    /// The address resolved to nothing.
    #[error("{addr} did not resolve to any socket address")]
    NoAddresses { addr: String },

    /// Every resolved address refused or timed out.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// An I/O error occurred on an established stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// The underlying I/O error, if any.
    pub fn io_source(&self) -> Option<&std::io::Error> {
        match self {
            TransportError::Resolve { source, .. }
            | TransportError::Connect { source, .. }
            | TransportError::Io(source) => Some(source),
            TransportError::NoAddresses { .. } => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
