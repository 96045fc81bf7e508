//! Caller cancellation for blocking TCP channels.
//!
//! A blocked `read`/`write` cannot be interrupted in place. [`CancelHandle`]
//! raises a shared flag and shuts the socket down, which wakes the blocked
//! call; the owner then reports `Cancelled(Requested)` instead of whatever
//! the torn-down socket returned.

use std::net::Shutdown;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lenframe_transport::NetStream;
use tracing::debug;

use crate::error::{CancelReason, FramingError, Result};

/// Cancels in-flight and future transfers on one TCP connection.
///
/// Obtained from `cancel_handle()` on a [`crate::FramedChannel`],
/// [`crate::FrameReader`] or [`crate::FrameWriter`] over [`NetStream`]. The
/// handle is `Send`, so it can be moved to the thread that decides to abort.
#[derive(Debug)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
    stream: NetStream,
}

impl CancelHandle {
    pub(crate) fn new(flag: Arc<AtomicBool>, stream: NetStream) -> Self {
        Self { flag, stream }
    }

    /// Abort the transfer in progress, if any, and every later one.
    ///
    /// The owning channel is poisoned by the aborted (or next) call.
    pub fn cancel(&self) -> Result<()> {
        self.flag.store(true, Ordering::Release);
        self.stream.shutdown(Shutdown::Both)?;
        debug!("cancellation requested");
        Ok(())
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Fail fast when cancellation was requested before the call started.
pub(crate) fn ensure_not_cancelled(flag: &AtomicBool) -> Result<()> {
    if flag.load(Ordering::Acquire) {
        return Err(FramingError::Cancelled(CancelReason::Requested));
    }
    Ok(())
}

/// Report a transfer failure caused by [`CancelHandle::cancel`] as a cancellation.
pub(crate) fn attribute(flag: &AtomicBool, err: FramingError) -> FramingError {
    match err {
        FramingError::MessageTooLarge { .. } | FramingError::Poisoned => err,
        _ if flag.load(Ordering::Acquire) => FramingError::Cancelled(CancelReason::Requested),
        _ => err,
    }
}

#[cfg(test)]
mod tests {
    use std::io::ErrorKind;

    use super::*;
    use crate::error::FrameStage;

    #[test]
    fn attribute_leaves_errors_alone_until_cancelled() {
        let flag = AtomicBool::new(false);
        let closed = FramingError::ConnectionClosed {
            stage: FrameStage::Prefix,
            received: 0,
            expected: 2,
        };
        assert!(attribute(&flag, closed).is_clean_close());

        flag.store(true, Ordering::Release);
        let reset = FramingError::StreamRead(std::io::Error::from(ErrorKind::ConnectionReset));
        assert!(matches!(
            attribute(&flag, reset),
            FramingError::Cancelled(CancelReason::Requested)
        ));
    }

    #[test]
    fn size_errors_are_never_reattributed() {
        let flag = AtomicBool::new(true);
        let err = attribute(&flag, FramingError::MessageTooLarge { size: 9, max: 8 });
        assert!(matches!(err, FramingError::MessageTooLarge { .. }));
        assert!(ensure_not_cancelled(&flag).unwrap_err().is_cancelled());
    }
}
