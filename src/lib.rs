/*!
 * Message Queue Engine Library
 * Fixed-capacity, priority-ordered, blocking message queue
 */

pub mod core;
pub mod queue;

// Re-exports
pub use crate::core::types::{Priority, Size};
pub use queue::{MessageQueue, QueueAttributes, QueueError, QueueResult};
