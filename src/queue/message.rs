/*!
 * Message Record
 * Arena-backed message nodes for the dual-linked receive chain
 */

use super::types::{QueueError, QueueResult};
use crate::core::types::Priority;

/// Index handle into the message arena
pub(super) type MsgIdx = usize;

/// A single enqueued message.
///
/// The two link fields place the record on both traversal structures:
/// `next_receive` is the full delivery-order chain, `next_priority` is
/// only meaningful on a priority group's tail, where it refers to the
/// tail of the next (lower) priority group. Links are arena indices
/// rather than pointers, so unlinking a node from one or both chains
/// cannot dangle.
#[derive(Debug)]
pub(super) struct Message {
    pub priority: Priority,
    pub payload: Box<[u8]>,
    /// Next message in delivery order
    pub next_receive: Option<MsgIdx>,
    /// Tail of the next priority group
    pub next_priority: Option<MsgIdx>,
}

impl Message {
    /// Builds a record holding a fallibly-allocated copy of the payload.
    ///
    /// Allocation failure surfaces as `OutOfMemory` before the queue has
    /// been mutated in any way.
    pub fn try_new(payload: &[u8], priority: Priority) -> QueueResult<Self> {
        let mut body = Vec::new();
        body.try_reserve_exact(payload.len())
            .map_err(|_| QueueError::OutOfMemory)?;
        body.extend_from_slice(payload);
        Ok(Self {
            priority,
            payload: body.into_boxed_slice(),
            next_receive: None,
            next_priority: None,
        })
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }
}
