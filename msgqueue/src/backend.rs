//! Shared queue state
//!
//! One [`Backend`] exists per created queue and is shared by all of its
//! handles. Everything mutable lives in [`BackendState`] behind a single
//! `parking_lot::Mutex`; the two condition variables are paired with that
//! mutex:
//!
//! - `data_available`: waited on by readers while the ring holds no message
//! - `space_available`: waited on by writers while the ring cannot take their
//!   message
//!
//! # Readiness bits
//!
//! `qevents` persists between calls. A bit is set by the operation that makes
//! the condition true (through [`BackendState::trigger_event`], which also
//! wakes pollers) and is cleared only when the condition measurably becomes
//! false:
//!
//! | bit          | set by                                   | cleared by                           |
//! |--------------|------------------------------------------|--------------------------------------|
//! | `READABLE`   | write, last writer closed                | read empties the ring, writer reopens|
//! | `WRITABLE`   | read, last reader closed                 | write fills the ring, reader reopens |
//! | `NO_READERS` | last reader closed                       | a reader opens                       |
//! | `NO_WRITERS` | last writer closed                       | a writer opens                       |

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::TryReserveError;

use crate::flags::{PollEvents, QueueFlags};
use crate::io::RingBuffer;
use crate::poll::WaitEntry;
use crate::transfer::FRAME_HEADER;

/// Point-in-time view of a queue, for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueStats {
    pub capacity: usize,
    pub used: usize,
    pub free: usize,
    pub refs: usize,
    pub readers: usize,
    pub writers: usize,
    pub no_readers: bool,
    pub no_writers: bool,
    pub qevents: PollEvents,
    /// Poll calls currently registered on this queue
    pub pollers: usize,
}

pub(crate) struct BackendState {
    pub(crate) buffer: RingBuffer,

    pub(crate) refs: usize,
    pub(crate) readers: usize,
    pub(crate) writers: usize,

    /// Set when the last reader closes, cleared when a reader opens
    pub(crate) no_readers: bool,
    /// Set when the last writer closes, cleared when a writer opens
    pub(crate) no_writers: bool,

    pub(crate) qevents: PollEvents,
    pub(crate) wait_registry: Vec<WaitEntry>,

    destroyed: bool,
}

impl BackendState {
    /// True if the ring holds at least one framed message
    ///
    /// Messages are written whole, so any stored byte means a full frame.
    pub(crate) fn has_message(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// True if not even a one-byte message fits
    pub(crate) fn is_full(&self) -> bool {
        self.buffer.free() <= FRAME_HEADER
    }

    /// Mark `events` as true and wake every poller interested in them
    ///
    /// Must be called with the backend lock held, which the `&mut self`
    /// receiver guarantees.
    pub(crate) fn trigger_event(&mut self, events: PollEvents, debug_hint: &str) {
        self.qevents.insert(events);

        let mut woken = 0usize;
        for entry in &self.wait_registry {
            if entry.events.intersects(self.qevents) && entry.wake() {
                woken += 1;
            }
        }

        log::debug!(
            "queue.trigger: '{debug_hint}', events={events:?}, qevents={:?}, pollers: {}, woken: {woken}",
            self.qevents,
            self.wait_registry.len(),
        );
    }

    fn destroy(&mut self) {
        assert_eq!(self.refs, 0);
        assert_eq!(self.readers, 0);
        assert_eq!(self.writers, 0);
        debug_assert!(self.wait_registry.is_empty());

        self.buffer.release();
        self.wait_registry = Vec::new();
        self.qevents = PollEvents::empty();
        self.destroyed = true;

        #[cfg(test)]
        tests::DESTROYED.with(|count| count.set(count.get() + 1));
    }
}

pub(crate) struct Backend {
    state: Mutex<BackendState>,
    pub(crate) data_available: Condvar,
    pub(crate) space_available: Condvar,
    debug_hint: String,
}

impl Backend {
    /// Allocate a backend with no handles attached
    pub(crate) fn new(capacity: usize, debug_hint: &str) -> Result<Self, TryReserveError> {
        let buffer = RingBuffer::with_capacity(capacity)?;

        let mut state = BackendState {
            buffer,
            refs: 0,
            readers: 0,
            writers: 0,
            no_readers: false,
            no_writers: false,
            qevents: PollEvents::empty(),
            wait_registry: Vec::new(),
            destroyed: false,
        };
        if !state.is_full() {
            state.qevents.insert(PollEvents::WRITABLE);
        }

        Ok(Self {
            state: Mutex::new(state),
            data_available: Condvar::new(),
            space_available: Condvar::new(),
            debug_hint: debug_hint.to_string(),
        })
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, BackendState> {
        let state = self.state.lock();
        debug_assert!(!state.destroyed, "queue '{}' used after destruction", self.debug_hint);
        state
    }

    pub(crate) fn debug_hint(&self) -> &str {
        &self.debug_hint
    }

    /// Account for a new handle carrying `flags`
    ///
    /// Opening a reader (writer) re-arms `no_readers` (`no_writers`): closing
    /// every handle of a kind is an edge that can happen again once a new
    /// handle of that kind appears.
    pub(crate) fn attach(&self, flags: QueueFlags) {
        let mut state = self.lock();
        state.refs += 1;

        if flags.contains(QueueFlags::READER) {
            state.readers += 1;
            if state.no_readers {
                state.no_readers = false;
                state.qevents.remove(PollEvents::NO_READERS);
                if state.is_full() {
                    state.qevents.remove(PollEvents::WRITABLE);
                }
            }
        }
        if flags.contains(QueueFlags::WRITER) {
            state.writers += 1;
            if state.no_writers {
                state.no_writers = false;
                state.qevents.remove(PollEvents::NO_WRITERS);
                if !state.has_message() {
                    state.qevents.remove(PollEvents::READABLE);
                }
            }
        }

        log::debug!(
            "queue.open: '{}', flags={flags:?}, refs={}, readers={}, writers={}",
            self.debug_hint,
            state.refs,
            state.readers,
            state.writers
        );
    }

    /// Drop a handle carrying `flags`
    ///
    /// Returns `true` if this was the last handle and the backend has been
    /// destroyed.
    pub(crate) fn detach(&self, flags: QueueFlags) -> bool {
        let mut state = self.lock();
        assert!(state.refs != 0);
        assert!(state.refs >= state.readers);
        assert!(state.refs >= state.writers);

        state.refs -= 1;

        let mut last_reader = false;
        let mut last_writer = false;
        if flags.contains(QueueFlags::READER) {
            state.readers -= 1;
            if state.readers == 0 {
                state.no_readers = true;
                last_reader = true;
            }
        }
        if flags.contains(QueueFlags::WRITER) {
            state.writers -= 1;
            if state.writers == 0 {
                state.no_writers = true;
                last_writer = true;
            }
        }

        log::debug!(
            "queue.close: '{}', flags={flags:?}, refs={}, readers={}, writers={}",
            self.debug_hint,
            state.refs,
            state.readers,
            state.writers
        );

        if state.refs == 0 {
            state.destroy();
            log::debug!("queue.destroy: '{}'", self.debug_hint);
            return true;
        }

        let mut events = PollEvents::empty();
        if last_writer {
            // Blocked readers must observe end-of-stream
            events.insert(PollEvents::READABLE | PollEvents::NO_WRITERS);
            self.data_available.notify_all();
        }
        if last_reader {
            // Blocked writers must observe the broken pipe
            events.insert(PollEvents::WRITABLE | PollEvents::NO_READERS);
            self.space_available.notify_all();
        }
        if !events.is_empty() {
            state.trigger_event(events, &self.debug_hint);
        }
        false
    }

    pub(crate) fn stats(&self) -> QueueStats {
        let state = self.lock();
        QueueStats {
            capacity: state.buffer.capacity(),
            used: state.buffer.used(),
            free: state.buffer.free(),
            refs: state.refs,
            readers: state.readers,
            writers: state.writers,
            no_readers: state.no_readers,
            no_writers: state.no_writers,
            qevents: state.qevents,
            pollers: state.wait_registry.len(),
        }
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("debug_hint", &self.debug_hint)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::Cell;

    thread_local! {
        /// Backends destroyed by the current thread
        pub(crate) static DESTROYED: Cell<usize> = const { Cell::new(0) };
    }

    pub(crate) fn destroyed_on_this_thread() -> usize {
        DESTROYED.with(Cell::get)
    }

    #[test]
    fn test_new_backend_is_writable() {
        let backend = Backend::new(64, "test").unwrap();
        let stats = backend.stats();
        assert_eq!(stats.refs, 0);
        assert_eq!(stats.capacity, 64);
        assert_eq!(stats.qevents, PollEvents::WRITABLE);
    }

    #[test]
    fn test_tiny_backend_is_not_writable() {
        let backend = Backend::new(FRAME_HEADER, "tiny").unwrap();
        assert_eq!(backend.stats().qevents, PollEvents::empty());
    }

    #[test]
    fn test_attach_detach_counts() {
        let backend = Backend::new(64, "test").unwrap();
        backend.attach(QueueFlags::READER | QueueFlags::WRITER);
        backend.attach(QueueFlags::READER);

        let stats = backend.stats();
        assert_eq!((stats.refs, stats.readers, stats.writers), (2, 2, 1));

        assert!(!backend.detach(QueueFlags::READER));
        let stats = backend.stats();
        assert_eq!((stats.refs, stats.readers, stats.writers), (1, 1, 1));
        assert!(!stats.no_readers);

        let before = destroyed_on_this_thread();
        assert!(backend.detach(QueueFlags::READER | QueueFlags::WRITER));
        assert_eq!(destroyed_on_this_thread(), before + 1);
    }

    #[test]
    fn test_last_writer_sets_end_of_stream_bits() {
        let backend = Backend::new(64, "test").unwrap();
        backend.attach(QueueFlags::READER);
        backend.attach(QueueFlags::WRITER);

        assert!(!backend.detach(QueueFlags::WRITER));
        let stats = backend.stats();
        assert!(stats.no_writers);
        assert!(stats.qevents.contains(PollEvents::READABLE | PollEvents::NO_WRITERS));

        // Reopening a writer re-arms the flag and clears the stale bits
        backend.attach(QueueFlags::WRITER);
        let stats = backend.stats();
        assert!(!stats.no_writers);
        assert!(!stats.qevents.intersects(PollEvents::READABLE | PollEvents::NO_WRITERS));

        backend.detach(QueueFlags::WRITER);
        backend.detach(QueueFlags::READER);
    }
}
