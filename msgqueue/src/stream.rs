//! `embedded_io` adapters
//!
//! [`QueueReader`] and [`QueueWriter`] expose a handle through the
//! `embedded_io::Read` / `embedded_io::Write` traits. Each call transfers one
//! whole message:
//!
//! - `read` returns the length of the next message, or `Ok(0)` at
//!   end-of-stream; a buffer that is too short yields `MessageTooLarge`
//!   and leaves the message in the queue
//! - `write` sends `buf` as one message and reports all of it as written;
//!   an empty `buf` is a no-op returning `Ok(0)`

use embedded_io::ErrorType;

use crate::error::QueueError;
use crate::flags::QueueFlags;
use crate::handle::Handle;

/// Read side adapter
#[derive(Debug)]
pub struct QueueReader {
    handle: Handle,
}

impl QueueReader {
    /// Wrap a reader handle
    ///
    /// # Errors
    ///
    /// `BadHandle` if the handle is null or lacks `READER`.
    pub fn new(handle: Handle) -> Result<Self, QueueError> {
        if handle.is_null() || !handle.flags().contains(QueueFlags::READER) {
            return Err(QueueError::BadHandle);
        }
        Ok(Self { handle })
    }

    #[must_use]
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    #[must_use]
    pub fn into_inner(self) -> Handle {
        self.handle
    }
}

impl ErrorType for QueueReader {
    type Error = QueueError;
}

impl embedded_io::Read for QueueReader {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.handle.read(buf)
    }
}

/// Write side adapter
#[derive(Debug)]
pub struct QueueWriter {
    handle: Handle,
}

impl QueueWriter {
    /// Wrap a writer handle
    ///
    /// # Errors
    ///
    /// `BadHandle` if the handle is null or lacks `WRITER`.
    pub fn new(handle: Handle) -> Result<Self, QueueError> {
        if handle.is_null() || !handle.flags().contains(QueueFlags::WRITER) {
            return Err(QueueError::BadHandle);
        }
        Ok(Self { handle })
    }

    #[must_use]
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    #[must_use]
    pub fn into_inner(self) -> Handle {
        self.handle
    }
}

impl ErrorType for QueueWriter {
    type Error = QueueError;
}

impl embedded_io::Write for QueueWriter {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            // IMPORTANT: the queue rejects empty messages, so don't send one
            return Ok(0);
        }
        self.handle.write(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
