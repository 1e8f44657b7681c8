/*!
 * Core Module
 * Shared types for the queue engine
 */

pub mod types;

pub use types::{Priority, Size};
