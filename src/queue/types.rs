/*!
 * Queue Types
 * Attributes and error types for the message queue
 */

use serde::{Deserialize, Serialize};
use thiserror::Error;

// Default attribute values, matching the usual mq_open defaults
pub const DEFAULT_MAX_MESSAGES: usize = 10;
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 8192;

/// Queue operation result
pub type QueueResult<T> = Result<T, QueueError>;

/// Unified queue error type
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum QueueError {
    /// Payload exceeds the queue's message size attribute
    #[error("message of {size} bytes exceeds maximum of {max}")]
    MessageTooLarge { size: usize, max: usize },

    /// Destination buffer smaller than the message size attribute
    #[error("buffer of {size} bytes is smaller than required {required}")]
    BufferTooSmall { size: usize, required: usize },

    /// Queue full (send) or empty (receive) in non-blocking mode
    #[error("operation would block")]
    WouldBlock,

    /// Message allocation failed
    #[error("out of memory")]
    OutOfMemory,

    /// Deadline elapsed while still blocked
    #[error("timed out")]
    TimedOut,
}

/// Queue attributes, mirroring `mq_attr`
///
/// `max_messages` and `max_message_size` are fixed when the queue is
/// created; `non_blocking` may be toggled at runtime. `current_messages`
/// is maintained by the engine and ignored on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueAttributes {
    pub max_messages: usize,
    pub max_message_size: usize,
    pub current_messages: usize,
    pub non_blocking: bool,
}

impl QueueAttributes {
    pub fn new(max_messages: usize, max_message_size: usize) -> Self {
        Self {
            max_messages,
            max_message_size,
            current_messages: 0,
            non_blocking: false,
        }
    }

    /// Sets the non-blocking flag, builder style
    pub fn non_blocking(mut self, non_blocking: bool) -> Self {
        self.non_blocking = non_blocking;
        self
    }
}

impl Default for QueueAttributes {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGES, DEFAULT_MAX_MESSAGE_SIZE)
    }
}
