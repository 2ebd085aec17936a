//! Error type for queue operations
//!
//! Every fallible operation returns [`QueueError`]. `WouldBlock`, `BrokenPipe`
//! and `MessageTooLarge` on read are expected outcomes that callers check for
//! on every call; the remaining variants mean the call was rejected and the
//! queue state is unchanged.

use std::collections::TryReserveError;
use std::io;

use core::ffi::c_int;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The handle is null or lacks the capability the operation needs
    #[error("bad queue handle")]
    BadHandle,

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The handle is non-blocking and the operation would have suspended
    #[error("operation would block")]
    WouldBlock,

    /// On write: the framed message can never fit into the queue.
    /// On read: the caller's buffer is smaller than the next message, which
    /// stays in the queue.
    #[error("message of {size} bytes does not fit into {limit} bytes")]
    MessageTooLarge { size: usize, limit: usize },

    /// All reader handles are closed
    #[error("broken pipe")]
    BrokenPipe,

    #[error("out of memory: {0}")]
    OutOfMemory(#[from] TryReserveError),
}

impl QueueError {
    /// POSIX errno value for this error
    #[must_use]
    pub fn errno(&self) -> c_int {
        match self {
            Self::BadHandle => 9,                // EBADF
            Self::InvalidArgument(_) => 22,      // EINVAL
            Self::WouldBlock => 11,              // EAGAIN
            Self::MessageTooLarge { .. } => 90,  // EMSGSIZE
            Self::BrokenPipe => 32,              // EPIPE
            Self::OutOfMemory(_) => 12,          // ENOMEM
        }
    }

    /// Convert to `embedded_io::ErrorKind`
    #[must_use]
    pub fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            Self::BadHandle | Self::InvalidArgument(_) | Self::MessageTooLarge { .. } => {
                embedded_io::ErrorKind::InvalidInput
            }
            Self::BrokenPipe => embedded_io::ErrorKind::BrokenPipe,
            Self::OutOfMemory(_) => embedded_io::ErrorKind::OutOfMemory,
            // embedded_io has no dedicated "would block" kind
            Self::WouldBlock => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::Error for QueueError {
    fn kind(&self) -> embedded_io::ErrorKind {
        QueueError::kind(self)
    }
}

impl From<QueueError> for io::Error {
    fn from(e: QueueError) -> Self {
        let kind = match e {
            QueueError::BadHandle | QueueError::InvalidArgument(_) => io::ErrorKind::InvalidInput,
            QueueError::WouldBlock => io::ErrorKind::WouldBlock,
            QueueError::MessageTooLarge { .. } => io::ErrorKind::InvalidData,
            QueueError::BrokenPipe => io::ErrorKind::BrokenPipe,
            QueueError::OutOfMemory(_) => io::ErrorKind::OutOfMemory,
        };
        io::Error::new(kind, e)
    }
}
