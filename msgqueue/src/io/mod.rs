//! Storage layer
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │  Handle / transfer engine           │
//! │  - framing, blocking, readiness     │
//! └─────────────────────────────────────┘
//!          │ under the backend lock
//!          ▼
//! ┌─────────────────────────────────────┐
//! │  RingBuffer (byte storage)          │
//! │  - peek / read / write              │
//! │  - used / free / capacity           │
//! └─────────────────────────────────────┘
//! ```

pub mod ring_buffer;

pub use ring_buffer::RingBuffer;
