//! Message transfer engine
//!
//! Messages are stored in the ring as an 8-byte little-endian length followed
//! by the payload. A frame is written or consumed whole while the backend lock
//! is held, so the ring never contains a partial message.

use crate::backend::Backend;
use crate::error::QueueError;
use crate::flags::{PollEvents, QueueFlags};

/// Size of the length prefix in front of every message
pub const FRAME_HEADER: usize = 8;

/// Read the next message into `buf`
///
/// Returns the payload length, or 0 at end-of-stream (the ring is empty and
/// every writer has closed).
pub(crate) fn read(
    backend: &Backend,
    flags: QueueFlags,
    buf: &mut [u8],
) -> Result<usize, QueueError> {
    let hint = backend.debug_hint();
    let mut state = backend.lock();

    while !state.has_message() && !state.no_writers {
        if flags.contains(QueueFlags::NON_BLOCKING) {
            log::debug!("queue.read: '{hint}' is empty, would block");
            return Err(QueueError::WouldBlock);
        }
        backend.data_available.wait(&mut state);
    }

    if !state.has_message() {
        state.trigger_event(PollEvents::NO_WRITERS, hint);
        log::debug!("queue.read: '{hint}' end-of-stream");
        return Ok(0);
    }

    let mut header = [0u8; FRAME_HEADER];
    let peeked = state.buffer.peek(&mut header);
    debug_assert_eq!(peeked, FRAME_HEADER);
    let size = frame_len(header);

    if buf.len() < size {
        log::debug!(
            "queue.read: '{hint}' message of {size} bytes, buffer of {} bytes",
            buf.len()
        );
        // The message stays; let another blocked reader try it
        backend.data_available.notify_one();
        return Err(QueueError::MessageTooLarge {
            size,
            limit: buf.len(),
        });
    }

    state.buffer.consume(FRAME_HEADER);
    let copied = state.buffer.read(&mut buf[..size]);
    debug_assert_eq!(copied, size);

    // Writers may need different amounts of space; each re-checks its own
    backend.space_available.notify_all();

    if !state.has_message() && !state.no_writers {
        state.qevents.remove(PollEvents::READABLE);
    }
    state.trigger_event(PollEvents::WRITABLE, hint);

    Ok(size)
}

/// Append `data` as one message
pub(crate) fn write(backend: &Backend, flags: QueueFlags, data: &[u8]) -> Result<(), QueueError> {
    let hint = backend.debug_hint();

    if data.is_empty() {
        log::warn!("queue.write: '{hint}' empty message rejected");
        return Err(QueueError::InvalidArgument("empty message"));
    }
    let framed = data.len().saturating_add(FRAME_HEADER);

    let mut state = backend.lock();

    let capacity = state.buffer.capacity();
    if framed > capacity {
        log::warn!(
            "queue.write: '{hint}' message of {} bytes can never fit into {capacity} bytes",
            data.len()
        );
        return Err(QueueError::MessageTooLarge {
            size: data.len(),
            limit: capacity.saturating_sub(FRAME_HEADER),
        });
    }

    while state.buffer.free() < framed && !state.no_readers {
        if flags.contains(QueueFlags::NON_BLOCKING) {
            log::debug!("queue.write: '{hint}' is full, would block");
            return Err(QueueError::WouldBlock);
        }
        backend.space_available.wait(&mut state);
    }

    if state.no_readers {
        state.trigger_event(PollEvents::NO_READERS, hint);
        log::debug!("queue.write: '{hint}' broken pipe");
        return Err(QueueError::BrokenPipe);
    }

    let header = (data.len() as u64).to_le_bytes();
    state.buffer.write(&header);
    let stored = state.buffer.write(data);
    debug_assert_eq!(stored, data.len());

    backend.data_available.notify_one();

    if state.is_full() && !state.no_readers {
        state.qevents.remove(PollEvents::WRITABLE);
    }
    state.trigger_event(PollEvents::READABLE, hint);

    Ok(())
}

fn frame_len(header: [u8; FRAME_HEADER]) -> usize {
    // Only lengths written by `write` ever reach the ring, and those came from
    // a `usize`
    usize::try_from(u64::from_le_bytes(header)).unwrap_or(usize::MAX)
}
