/*!
 * Core Types
 * Common types used across the queue engine
 */

/// Message priority (higher is delivered first)
pub type Priority = u32;

/// Size type for payload and buffer lengths
pub type Size = usize;
