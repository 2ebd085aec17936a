//! Queue handles
//!
//! A [`Handle`] is a capability: a shared reference to a queue backend plus
//! the flags (`READER`, `WRITER`, `NON_BLOCKING`) it was opened with. Every
//! handle counts as one reference to its queue, and as one reader and/or
//! writer. The queue is destroyed when its last handle is closed.
//!
//! # Thread Safety
//!
//! `Handle` is `Send + Sync`. Reads, writes and polls through the same handle
//! from several threads are serialized by the queue lock. Closing needs
//! `&mut self`, so a handle cannot be closed while another thread borrows it.
//!
//! # Drop
//!
//! Dropping a non-null handle closes it.

use std::fmt;
use std::sync::Arc;

use crate::backend::{Backend, QueueStats};
use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::flags::QueueFlags;
use crate::transfer;

pub struct Handle {
    backend: Option<Arc<Backend>>,
    flags: QueueFlags,
}

impl Handle {
    /// The null handle
    #[must_use]
    pub const fn null() -> Self {
        Self {
            backend: None,
            flags: QueueFlags::empty(),
        }
    }

    /// Create a queue with a ring of `capacity` bytes and open a first handle
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `flags` has unknown bits
    /// - `OutOfMemory` if the ring cannot be allocated
    pub fn create(capacity: usize, flags: QueueFlags) -> Result<Self, QueueError> {
        Self::create_with(&QueueConfig::new(capacity).with_flags(flags))
    }

    /// Create a queue as described by `config`
    ///
    /// # Errors
    ///
    /// Same as [`Handle::create`].
    pub fn create_with(config: &QueueConfig) -> Result<Self, QueueError> {
        check_flags(config.flags, "queue.create")?;

        let backend = Backend::new(config.capacity, &config.debug_hint).map_err(|e| {
            log::error!(
                "queue.create: '{}', cannot allocate {} bytes: {e}",
                config.debug_hint,
                config.capacity
            );
            QueueError::OutOfMemory(e)
        })?;

        Ok(Self::attach(Arc::new(backend), config.flags))
    }

    /// Open another handle to the same queue
    ///
    /// # Errors
    ///
    /// - `BadHandle` if this handle is null
    /// - `InvalidArgument` if `flags` has unknown bits
    pub fn open(&self, flags: QueueFlags) -> Result<Self, QueueError> {
        let Some(backend) = &self.backend else {
            log::warn!("queue.open: null handle");
            return Err(QueueError::BadHandle);
        };
        check_flags(flags, "queue.open")?;

        Ok(Self::attach(Arc::clone(backend), flags))
    }

    /// Close the handle; it becomes null
    ///
    /// Closing the last reader (writer) wakes blocked writers (readers) so
    /// they observe the broken pipe (end-of-stream). Closing the last handle
    /// destroys the queue.
    ///
    /// # Errors
    ///
    /// `BadHandle` if the handle is already null.
    pub fn close(&mut self) -> Result<(), QueueError> {
        let Some(backend) = self.backend.take() else {
            log::warn!("queue.close: null handle");
            return Err(QueueError::BadHandle);
        };
        let flags = std::mem::take(&mut self.flags);

        backend.detach(flags);
        Ok(())
    }

    /// Read one message into `buf`
    ///
    /// Blocks while the queue is empty and writers remain, unless the handle
    /// is non-blocking. Returns the message length, or 0 at end-of-stream.
    ///
    /// # Errors
    ///
    /// - `BadHandle` if the handle is null or not a reader
    /// - `WouldBlock` if non-blocking and the queue is empty
    /// - `MessageTooLarge` if `buf` is shorter than the next message; the
    ///   message is kept and `size` tells how much room it needs
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, QueueError> {
        let backend = self.endpoint(QueueFlags::READER, "queue.read")?;
        transfer::read(backend, self.flags, buf)
    }

    /// Write `data` as one message
    ///
    /// Blocks while the queue lacks space and readers remain, unless the
    /// handle is non-blocking.
    ///
    /// # Errors
    ///
    /// - `BadHandle` if the handle is null or not a writer
    /// - `InvalidArgument` if `data` is empty
    /// - `MessageTooLarge` if the message can never fit into the queue
    /// - `WouldBlock` if non-blocking and the queue lacks space
    /// - `BrokenPipe` if every reader has closed
    pub fn write(&self, data: &[u8]) -> Result<(), QueueError> {
        let backend = self.endpoint(QueueFlags::WRITER, "queue.write")?;
        transfer::write(backend, self.flags, data)
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.backend.is_none()
    }

    /// Flags the handle was opened with; empty for the null handle
    #[must_use]
    pub fn flags(&self) -> QueueFlags {
        self.flags
    }

    /// True if both handles refer to the same queue
    #[must_use]
    pub fn same_queue(&self, other: &Handle) -> bool {
        match (&self.backend, &other.backend) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Snapshot of the queue state
    ///
    /// # Errors
    ///
    /// `BadHandle` if the handle is null.
    pub fn stats(&self) -> Result<QueueStats, QueueError> {
        self.backend
            .as_ref()
            .map(|backend| backend.stats())
            .ok_or(QueueError::BadHandle)
    }

    pub(crate) fn backend(&self) -> Option<&Arc<Backend>> {
        self.backend.as_ref()
    }

    fn attach(backend: Arc<Backend>, flags: QueueFlags) -> Self {
        backend.attach(flags);
        Self {
            backend: Some(backend),
            flags,
        }
    }

    fn endpoint(&self, required: QueueFlags, op: &str) -> Result<&Backend, QueueError> {
        match &self.backend {
            Some(backend) if self.flags.contains(required) => Ok(&**backend),
            Some(backend) => {
                log::warn!(
                    "{op}: '{}', handle flags {:?} lack {required:?}",
                    backend.debug_hint(),
                    self.flags
                );
                Err(QueueError::BadHandle)
            }
            None => {
                log::warn!("{op}: null handle");
                Err(QueueError::BadHandle)
            }
        }
    }
}

fn check_flags(flags: QueueFlags, op: &str) -> Result<(), QueueError> {
    if flags.is_known() {
        Ok(())
    } else {
        log::warn!("{op}: unknown flags {flags:?}");
        Err(QueueError::InvalidArgument("unknown queue flags"))
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.backend {
            Some(backend) => write!(
                f,
                "Queue.Handle(hint={}, flags={:?})",
                backend.debug_hint(),
                self.flags
            ),
            None => write!(f, "Queue.Handle(null)"),
        }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if !self.is_null() {
            if let Err(e) = self.close() {
                log::warn!("Handle::drop: close failed: {e}");
            }
        }
    }
}
