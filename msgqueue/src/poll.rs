//! Multiplexed readiness wait
//!
//! A poll call watches several queues at once. The workflow:
//!
//! 10. Poller: validate all entries
//! 20. Poller: create a private [`WaitingThread`]
//! 30. Poller: for each queue, under that queue's lock, append a [`WaitEntry`]
//!     pointing to the waiting thread
//! 40. Poller: take a readiness snapshot; if something is ready, go to 70
//! 50. Poller: sleep on the waiting thread until woken
//! 60. Poller: take the snapshot again; if nothing is ready, go to 50
//! 70. Poller: under each queue's lock, remove its entries
//!
//! 80. Mutator: change the queue state, then (still under the queue lock) wake
//!     every registered waiting thread whose requested events are now true
//!
//! A mutation that happens before step 30 on some queue is visible to the
//! snapshot in step 40. A mutation after step 30 finds the entry and wakes the
//! poller. The wakeup is latched in the waiting thread (`notified`), so a wake
//! that arrives between the snapshot and the sleep is not lost.
//!
//! # Locks
//!
//! The waiting-thread mutex is a leaf lock: a mutator takes it briefly while
//! holding one queue lock, and the poller never holds it while taking a queue
//! lock. The poller takes queue locks one at a time. Two pollers, or a poller
//! and a mutator, therefore cannot form a lock cycle.

use parking_lot::{Condvar, Mutex};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use crate::backend::Backend;
use crate::error::QueueError;
use crate::flags::{PollEvents, QueueFlags};
use crate::handle::Handle;

/// One queue to watch in a [`poll`] call
#[derive(Debug)]
pub struct PollEntry<'a> {
    /// Queue to watch. Null handles are skipped.
    pub handle: &'a Handle,
    /// Requested events
    pub events: PollEvents,
    /// Events reported by the last poll call
    pub revents: PollEvents,
}

impl<'a> PollEntry<'a> {
    #[must_use]
    pub fn new(handle: &'a Handle, events: PollEvents) -> Self {
        Self {
            handle,
            events,
            revents: PollEvents::empty(),
        }
    }

    /// True if any requested event was reported
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.events.intersects(self.revents)
    }
}

/// Private wakeup target of one poll call
pub(crate) struct WaitingThread {
    notified: Mutex<bool>,
    is_ready: Condvar,
}

impl WaitingThread {
    fn new() -> Self {
        Self {
            notified: Mutex::new(false),
            is_ready: Condvar::new(),
        }
    }

    fn notify(&self) {
        let mut notified = self.notified.lock();
        *notified = true;
        self.is_ready.notify_one();
    }

    /// Sleep until notified, consuming the notification
    fn wait(&self) {
        let mut notified = self.notified.lock();
        while !*notified {
            self.is_ready.wait(&mut notified);
        }
        *notified = false;
    }

    /// Sleep until notified or until `deadline`
    ///
    /// Returns `false` on timeout.
    fn wait_until(&self, deadline: Instant) -> bool {
        let mut notified = self.notified.lock();
        while !*notified {
            if self.is_ready.wait_until(&mut notified, deadline).timed_out() {
                return false;
            }
        }
        *notified = false;
        true
    }
}

/// Registration of a poll call in one queue's wait registry
pub(crate) struct WaitEntry {
    pub(crate) events: PollEvents,
    waiter: Weak<WaitingThread>,
}

impl WaitEntry {
    /// Wake the owning poll call
    ///
    /// Returns `false` if the call is already gone. Waking the same call
    /// several times is harmless: it recomputes readiness itself.
    pub(crate) fn wake(&self) -> bool {
        match self.waiter.upgrade() {
            Some(waiter) => {
                waiter.notify();
                true
            }
            None => false,
        }
    }
}

/// Entries of one poll call across all watched queues
///
/// Deregisters on drop, so the registries are cleaned even if the snapshot
/// code panics.
struct Registration {
    backends: Vec<Arc<Backend>>,
    waiter: Weak<WaitingThread>,
}

impl Registration {
    fn new(entries: &[PollEntry<'_>], waiter: &Arc<WaitingThread>) -> Self {
        let waiter = Arc::downgrade(waiter);
        let mut backends = Vec::with_capacity(entries.len());

        for entry in entries {
            let Some(backend) = entry.handle.backend() else {
                continue;
            };
            backend.lock().wait_registry.push(WaitEntry {
                events: entry.events,
                waiter: Weak::clone(&waiter),
            });
            backends.push(Arc::clone(backend));
        }

        Self { backends, waiter }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        for backend in &self.backends {
            backend
                .lock()
                .wait_registry
                .retain(|entry| !Weak::ptr_eq(&entry.waiter, &self.waiter));
        }
    }
}

/// Wait until at least one entry has a requested event
///
/// For every entry, `revents` is set to the requested events that are
/// currently true. Handles that can read or write also always get
/// `NO_READERS`/`NO_WRITERS` reported when those hold; these extra bits do
/// not count towards readiness unless requested.
///
/// Returns the number of ready entries.
///
/// # Errors
///
/// `InvalidArgument` if there are no non-null handles, an entry requests
/// unknown events, or requests `READABLE` (`WRITABLE`) on a handle without
/// `READER` (`WRITER`). Nothing is registered or waited on in that case.
pub fn poll(entries: &mut [PollEntry<'_>]) -> Result<usize, QueueError> {
    poll_until(entries, None)
}

/// Same as [`poll`], but gives up after `timeout`
///
/// Returns `Ok(0)` if nothing became ready in time. A timeout too large to
/// represent as a deadline (such as `Duration::MAX`) waits without limit.
///
/// # Errors
///
/// Same as [`poll`].
pub fn poll_timeout(entries: &mut [PollEntry<'_>], timeout: Duration) -> Result<usize, QueueError> {
    poll_until(entries, Instant::now().checked_add(timeout))
}

fn poll_until(entries: &mut [PollEntry<'_>], deadline: Option<Instant>) -> Result<usize, QueueError> {
    validate(entries)?;

    let waiter = Arc::new(WaitingThread::new());
    let registration = Registration::new(entries, &waiter);

    let mut ready = snapshot(entries);
    while ready == 0 {
        let woken = match deadline {
            None => {
                waiter.wait();
                true
            }
            Some(deadline) => waiter.wait_until(deadline),
        };
        ready = snapshot(entries);
        if !woken {
            log::debug!("queue.poll: timed out, ready: {ready}");
            break;
        }
    }

    drop(registration);
    Ok(ready)
}

fn validate(entries: &mut [PollEntry<'_>]) -> Result<(), QueueError> {
    let mut non_null = 0usize;

    for entry in entries.iter_mut() {
        entry.revents = PollEvents::empty();
        if entry.handle.is_null() {
            continue;
        }
        non_null += 1;

        let flags = entry.handle.flags();
        let reason = if !entry.events.is_known() {
            Some("unknown poll events requested")
        } else if entry.events.contains(PollEvents::READABLE) && !flags.contains(QueueFlags::READER)
        {
            Some("READABLE requested on a handle without READER")
        } else if entry.events.contains(PollEvents::WRITABLE) && !flags.contains(QueueFlags::WRITER)
        {
            Some("WRITABLE requested on a handle without WRITER")
        } else {
            None
        };

        if let Some(reason) = reason {
            log::warn!("queue.poll: {reason}: {entry:?}");
            return Err(QueueError::InvalidArgument(reason));
        }
    }

    if non_null == 0 {
        log::warn!("queue.poll: no queues to poll");
        return Err(QueueError::InvalidArgument("no queues to poll"));
    }
    Ok(())
}

/// Fill `revents` from the current `qevents` of every queue
fn snapshot(entries: &mut [PollEntry<'_>]) -> usize {
    let mut ready = 0;

    for entry in entries.iter_mut() {
        let Some(backend) = entry.handle.backend() else {
            continue;
        };
        let qevents = backend.lock().qevents;

        entry.revents = qevents & entry.events;
        if !entry.revents.is_empty() {
            ready += 1;
        }
        if entry.handle.flags().has_endpoint() {
            entry.revents |= qevents & (PollEvents::NO_READERS | PollEvents::NO_WRITERS);
        }
    }

    ready
}
