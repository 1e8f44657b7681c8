/*!
 * Queue Module
 * Priority-ordered blocking message queue engine
 */

mod chain;
mod message;

pub mod descriptor;
pub mod types;

// Re-export public API
pub use descriptor::MessageQueue;
pub use types::{QueueAttributes, QueueError, QueueResult};
