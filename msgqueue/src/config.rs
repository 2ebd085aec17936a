//! Queue configuration
//!
//! A [`QueueConfig`] describes a queue to create: ring capacity, the flags of
//! the first handle, and a debug hint that tags the queue's log lines.

use crate::error::QueueError;
use crate::flags::QueueFlags;

/// Capacity used when nothing else is configured
pub const DEFAULT_CAPACITY: usize = 4096;

/// Environment variable holding the ring capacity in bytes
pub const CAPACITY_VAR: &str = "MSGQUEUE_CAPACITY";

/// Environment variable holding the debug hint
pub const HINT_VAR: &str = "MSGQUEUE_HINT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    pub capacity: usize,
    pub flags: QueueFlags,
    pub debug_hint: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            flags: QueueFlags::READER | QueueFlags::WRITER,
            debug_hint: "msgqueue".to_string(),
        }
    }
}

impl QueueConfig {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_flags(mut self, flags: QueueFlags) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn with_debug_hint(mut self, debug_hint: &str) -> Self {
        self.debug_hint = debug_hint.to_string();
        self
    }

    /// Read the configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `MSGQUEUE_CAPACITY` is set but is not a
    /// non-negative integer.
    pub fn from_env() -> Result<Self, QueueError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`QueueConfig::from_env`], with a custom variable lookup
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the capacity value does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, QueueError> {
        let mut config = Self::default();

        if let Some(value) = lookup(CAPACITY_VAR) {
            config.capacity = value.trim().parse().map_err(|e| {
                log::warn!("config: {CAPACITY_VAR}={value:?} is not a size: {e}");
                QueueError::InvalidArgument("MSGQUEUE_CAPACITY is not a valid size")
            })?;
        }
        if let Some(hint) = lookup(HINT_VAR) {
            config.debug_hint = hint;
        }

        log::debug!("config: {config:?}");
        Ok(config)
    }
}
