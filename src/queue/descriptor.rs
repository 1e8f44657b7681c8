/*!
 * Queue Descriptor
 * Shared, lock-protected message queue with blocking send/receive
 */

use super::chain::MessageChain;
use super::message::Message;
use super::types::{QueueAttributes, QueueError, QueueResult};
use crate::core::types::Priority;
use log::{debug, trace};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Everything guarded by the descriptor lock
#[derive(Debug)]
struct QueueState {
    chain: MessageChain,
    attr: QueueAttributes,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<QueueState>,
    /// Senders sleep here while the queue is full
    not_full: Condvar,
    /// Receivers sleep here while the queue is empty
    not_empty: Condvar,
}

/// Shared message queue descriptor.
///
/// One mutex serializes every read and mutation of the attributes and
/// the chain; two condition variables (one per waiter class, both
/// guarded by that mutex) carry the blocking protocol, so a wake can
/// never strand a waiter of the opposite class. Cloning is cheap and
/// yields a handle to the same queue.
#[derive(Debug, Clone)]
pub struct MessageQueue {
    shared: Arc<Shared>,
}

impl MessageQueue {
    /// Creates a queue with the given capacity and size attributes.
    ///
    /// `current_messages` in the supplied attributes is ignored; a new
    /// queue always starts empty.
    pub fn new(attr: QueueAttributes) -> Self {
        debug!(
            "queue created (max_messages: {}, max_message_size: {}, non_blocking: {})",
            attr.max_messages, attr.max_message_size, attr.non_blocking
        );
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState {
                    chain: MessageChain::new(),
                    attr: QueueAttributes {
                        current_messages: 0,
                        ..attr
                    },
                }),
                not_full: Condvar::new(),
                not_empty: Condvar::new(),
            }),
        }
    }

    /// Enqueues a message, blocking while the queue is full unless the
    /// non-blocking flag is set.
    pub fn send(&self, payload: &[u8], priority: Priority) -> QueueResult<()> {
        self.send_inner(payload, priority, None)
    }

    /// Like [`send`](Self::send), but gives up at `deadline` with
    /// `TimedOut` if still blocked, leaving the queue untouched.
    pub fn send_deadline(
        &self,
        payload: &[u8],
        priority: Priority,
        deadline: Instant,
    ) -> QueueResult<()> {
        self.send_inner(payload, priority, Some(deadline))
    }

    /// Relative-timeout convenience over [`send_deadline`](Self::send_deadline).
    pub fn send_timeout(
        &self,
        payload: &[u8],
        priority: Priority,
        timeout: Duration,
    ) -> QueueResult<()> {
        self.send_inner(payload, priority, Some(Instant::now() + timeout))
    }

    /// Dequeues the highest-priority message into `buf`, blocking while
    /// the queue is empty unless the non-blocking flag is set.
    ///
    /// Returns the message length and priority. The payload copy is
    /// performed after the lock is released.
    pub fn receive(&self, buf: &mut [u8]) -> QueueResult<(usize, Priority)> {
        self.receive_inner(buf, None)
    }

    /// Like [`receive`](Self::receive), but gives up at `deadline` with
    /// `TimedOut` if still blocked.
    pub fn receive_deadline(
        &self,
        buf: &mut [u8],
        deadline: Instant,
    ) -> QueueResult<(usize, Priority)> {
        self.receive_inner(buf, Some(deadline))
    }

    /// Relative-timeout convenience over [`receive_deadline`](Self::receive_deadline).
    pub fn receive_timeout(
        &self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> QueueResult<(usize, Priority)> {
        self.receive_inner(buf, Some(Instant::now() + timeout))
    }

    /// Snapshot of the queue attributes (mq_getattr)
    pub fn attributes(&self) -> QueueAttributes {
        self.shared.state.lock().attr
    }

    /// Toggles the non-blocking flag and returns the previous
    /// attributes (mq_setattr: the only runtime-mutable field).
    ///
    /// Waiters of both classes are woken so a thread blocked under the
    /// old mode re-evaluates under the new one.
    pub fn set_non_blocking(&self, non_blocking: bool) -> QueueAttributes {
        let mut state = self.shared.state.lock();
        let previous = state.attr;
        state.attr.non_blocking = non_blocking;
        drop(state);
        if non_blocking {
            self.shared.not_full.notify_all();
            self.shared.not_empty.notify_all();
        }
        previous
    }

    /// Number of messages currently queued
    pub fn len(&self) -> usize {
        self.shared.state.lock().attr.current_messages
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn send_inner(
        &self,
        payload: &[u8],
        priority: Priority,
        deadline: Option<Instant>,
    ) -> QueueResult<()> {
        let mut state = self.shared.state.lock();
        loop {
            // Size validation precedes any wait, so it can never block.
            if payload.len() > state.attr.max_message_size {
                return Err(QueueError::MessageTooLarge {
                    size: payload.len(),
                    max: state.attr.max_message_size,
                });
            }
            if state.attr.current_messages < state.attr.max_messages {
                break;
            }
            if state.attr.non_blocking {
                return Err(QueueError::WouldBlock);
            }
            trace!(
                "send: queue full ({}/{}), waiting",
                state.attr.current_messages,
                state.attr.max_messages
            );
            self.wait_not_full(&mut state, deadline)?;
            // Woken: re-validate everything, the wake may be spurious
            // or the attributes may have changed meanwhile.
        }

        // The record is allocated before any structural mutation, so an
        // allocation failure leaves the queue state unchanged.
        let message = Message::try_new(payload, priority)?;
        state.chain.insert(message);
        state.attr.current_messages = state.chain.len();
        debug!(
            "sent {} bytes at priority {} ({}/{} queued)",
            payload.len(),
            priority,
            state.attr.current_messages,
            state.attr.max_messages
        );
        drop(state);
        self.shared.not_empty.notify_one();
        Ok(())
    }

    fn receive_inner(
        &self,
        buf: &mut [u8],
        deadline: Option<Instant>,
    ) -> QueueResult<(usize, Priority)> {
        let mut state = self.shared.state.lock();
        let message = loop {
            // The buffer must fit any admissible message, regardless of
            // the length actually stored at the head.
            if buf.len() < state.attr.max_message_size {
                return Err(QueueError::BufferTooSmall {
                    size: buf.len(),
                    required: state.attr.max_message_size,
                });
            }
            match state.chain.extract() {
                Some(message) => break message,
                None => {
                    if state.attr.non_blocking {
                        return Err(QueueError::WouldBlock);
                    }
                    trace!("receive: queue empty, waiting");
                    self.wait_not_empty(&mut state, deadline)?;
                }
            }
        };
        state.attr.current_messages = state.chain.len();
        debug!(
            "received {} bytes at priority {} ({} remaining)",
            message.len(),
            message.priority,
            state.attr.current_messages
        );
        drop(state);
        self.shared.not_full.notify_one();

        // Copy cost is paid outside the lock.
        let length = message.len();
        buf[..length].copy_from_slice(&message.payload);
        Ok((length, message.priority))
    }

    fn wait_not_full(
        &self,
        state: &mut MutexGuard<'_, QueueState>,
        deadline: Option<Instant>,
    ) -> QueueResult<()> {
        match deadline {
            Some(deadline) => {
                let result = self.shared.not_full.wait_until(state, deadline);
                // A wake can race the deadline; only report TimedOut if
                // the queue is in fact still full.
                if result.timed_out()
                    && state.attr.current_messages >= state.attr.max_messages
                {
                    return Err(QueueError::TimedOut);
                }
            }
            None => self.shared.not_full.wait(state),
        }
        Ok(())
    }

    fn wait_not_empty(
        &self,
        state: &mut MutexGuard<'_, QueueState>,
        deadline: Option<Instant>,
    ) -> QueueResult<()> {
        match deadline {
            Some(deadline) => {
                let result = self.shared.not_empty.wait_until(state, deadline);
                if result.timed_out() && state.chain.is_empty() {
                    return Err(QueueError::TimedOut);
                }
            }
            None => self.shared.not_empty.wait(state),
        }
        Ok(())
    }
}
