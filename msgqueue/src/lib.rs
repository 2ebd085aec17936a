//! Bounded in-process message queue with pipe-like semantics
//!
//! A queue is a ring of bytes holding length-framed messages. Handles to it
//! carry `READER`, `WRITER` and `NON_BLOCKING` capabilities. Closing every
//! writer makes readers see end-of-stream; closing every reader makes writers
//! see a broken pipe. [`poll`] waits for readiness on several queues at once.
//!
//! ```
//! use msgqueue::{poll, Handle, PollEntry, PollEvents, QueueFlags};
//!
//! let mut writer = Handle::create(1024, QueueFlags::WRITER).unwrap();
//! let reader = writer.open(QueueFlags::READER).unwrap();
//!
//! writer.write(b"hello").unwrap();
//!
//! let mut entries = [PollEntry::new(&reader, PollEvents::READABLE)];
//! assert_eq!(poll(&mut entries).unwrap(), 1);
//!
//! let mut buf = [0u8; 16];
//! let n = reader.read(&mut buf).unwrap();
//! assert_eq!(&buf[..n], b"hello");
//!
//! writer.close().unwrap();
//! assert_eq!(reader.read(&mut buf).unwrap(), 0); // end-of-stream
//! ```

mod backend;
pub mod config;
pub mod error;
pub mod flags;
pub mod handle;
pub mod io;
pub mod poll;
pub mod stream;
pub mod transfer;

pub use backend::QueueStats;
pub use config::QueueConfig;
pub use error::QueueError;
pub use flags::{PollEvents, QueueFlags};
pub use handle::Handle;
pub use poll::{poll, poll_timeout, PollEntry};
pub use stream::{QueueReader, QueueWriter};
pub use transfer::FRAME_HEADER;
