/*!
 * Receive Chain
 * Dual-linked priority structure with O(p) insertion
 *
 * Messages are stored in delivery order: descending priority, FIFO
 * within equal priority. Every node sits on the receive chain, but the
 * priority links only connect group tails (the last message at each
 * priority), so an insertion walks one node per distinct priority in
 * use rather than one per message.
 */

use super::message::{Message, MsgIdx};

/// The delivery-order structure shared by both queue paths.
///
/// Nodes live in an index arena; the free list recycles slots so a
/// long-lived queue does not grow its arena past the high-water mark.
/// Not synchronized: the owning descriptor serializes all access.
#[derive(Debug, Default)]
pub(super) struct MessageChain {
    slots: Vec<Option<Message>>,
    free: Vec<MsgIdx>,
    /// Next message to be returned, None iff empty
    receive_head: Option<MsgIdx>,
    /// Tail of the highest-priority group, None iff empty
    priority_tail: Option<MsgIdx>,
    len: usize,
}

impl MessageChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts a message at its delivery position.
    ///
    /// Walks the priority-group tails from the highest group down,
    /// stopping at the first group of equal or lower priority. Three
    /// cases fall out of the walk:
    /// - a group at this priority exists: the message goes right after
    ///   that group's tail in receive order and becomes the new tail;
    /// - a lower-priority group is ahead: the message forms its own
    ///   group immediately before it;
    /// - the walk ran off the end (or the chain is empty): the message
    ///   forms the new last (or only) group.
    pub fn insert(&mut self, mut message: Message) {
        let priority = message.priority;

        // prev_tail is the group tail whose links get rewritten; None
        // means the rewrite targets are the chain anchors themselves.
        let mut prev_tail: Option<MsgIdx> = None;
        let mut cursor = self.priority_tail;

        while let Some(tail) = cursor {
            let tail_priority = self.message(tail).priority;
            if tail_priority == priority {
                // Append behind the current tail of this group and take
                // over its position on the priority chain.
                message.next_receive = self.message(tail).next_receive;
                message.next_priority = self.message(tail).next_priority;
                let idx = self.alloc(message);
                self.message_mut(tail).next_receive = Some(idx);
                match prev_tail {
                    Some(prev) => self.message_mut(prev).next_priority = Some(idx),
                    None => self.priority_tail = Some(idx),
                }
                self.len += 1;
                return;
            }
            if tail_priority < priority {
                break;
            }
            prev_tail = Some(tail);
            cursor = self.message(tail).next_priority;
        }

        // First message at this priority: a new single-element group in
        // front of `cursor` (the first lower group, or the end).
        message.next_receive = match prev_tail {
            Some(prev) => self.message(prev).next_receive,
            None => self.receive_head,
        };
        message.next_priority = cursor;
        let idx = self.alloc(message);
        match prev_tail {
            Some(prev) => {
                self.message_mut(prev).next_receive = Some(idx);
                self.message_mut(prev).next_priority = Some(idx);
            }
            None => {
                self.receive_head = Some(idx);
                self.priority_tail = Some(idx);
            }
        }
        self.len += 1;
    }

    /// Removes and returns the head of the receive chain.
    ///
    /// If the head was the sole member of the highest-priority group
    /// (it coincides with the priority tail), the tail anchor advances
    /// to the next group; otherwise the group keeps its tail.
    pub fn extract(&mut self) -> Option<Message> {
        let head = self.receive_head?;
        let message = self.release(head);
        self.receive_head = message.next_receive;
        if self.priority_tail == Some(head) {
            self.priority_tail = message.next_priority;
        }
        self.len -= 1;
        if self.len == 0 {
            // Drop the arena's high-water storage once drained
            self.slots.clear();
            self.free.clear();
        }
        Some(message)
    }

    /// Priority of the highest-priority group's tail, None iff empty
    #[cfg(test)]
    pub fn tail_priority(&self) -> Option<crate::core::types::Priority> {
        self.priority_tail.map(|idx| self.message(idx).priority)
    }

    fn alloc(&mut self, message: Message) -> MsgIdx {
        match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(message);
                idx
            }
            None => {
                self.slots.push(Some(message));
                self.slots.len() - 1
            }
        }
    }

    fn release(&mut self, idx: MsgIdx) -> Message {
        let message = self.slots[idx].take();
        self.free.push(idx);
        debug_assert!(message.is_some(), "released an empty arena slot");
        match message {
            Some(m) => m,
            // Unreachable: indices on the chains always name live slots
            None => unreachable!(),
        }
    }

    fn message(&self, idx: MsgIdx) -> &Message {
        match &self.slots[idx] {
            Some(m) => m,
            None => unreachable!(),
        }
    }

    fn message_mut(&mut self, idx: MsgIdx) -> &mut Message {
        match &mut self.slots[idx] {
            Some(m) => m,
            None => unreachable!(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Priority;
    use pretty_assertions::assert_eq;

    fn msg(payload: &[u8], priority: Priority) -> Message {
        Message::try_new(payload, priority).unwrap()
    }

    fn drain(chain: &mut MessageChain) -> Vec<(Vec<u8>, Priority)> {
        let mut out = Vec::new();
        while let Some(m) = chain.extract() {
            out.push((m.payload.to_vec(), m.priority));
        }
        out
    }

    /// Walks the receive chain and checks the structural invariants
    fn check_invariants(chain: &MessageChain) {
        let mut count = 0;
        let mut cursor = chain.receive_head;
        let mut last_priority: Option<Priority> = None;
        while let Some(idx) = cursor {
            let m = chain.message(idx);
            if let Some(prev) = last_priority {
                assert!(m.priority <= prev, "receive chain out of order");
            }
            last_priority = Some(m.priority);
            count += 1;
            cursor = m.next_receive;
        }
        assert_eq!(count, chain.len());
        assert_eq!(chain.priority_tail.is_none(), chain.is_empty());
        if let Some(tail) = chain.priority_tail {
            // The anchor is the last message of the highest group: same
            // priority as the head, and its receive successor (if any)
            // has strictly lower priority.
            let tail_msg = chain.message(tail);
            let head_msg = chain.message(chain.receive_head.unwrap());
            assert_eq!(tail_msg.priority, head_msg.priority);
            if let Some(next) = tail_msg.next_receive {
                assert!(chain.message(next).priority < tail_msg.priority);
            }
        }
    }

    #[test]
    fn test_empty_chain() {
        let mut chain = MessageChain::new();
        assert!(chain.is_empty());
        assert!(chain.extract().is_none());
        assert_eq!(chain.tail_priority(), None);
    }

    #[test]
    fn test_single_message() {
        let mut chain = MessageChain::new();
        chain.insert(msg(b"only", 7));
        check_invariants(&chain);
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.tail_priority(), Some(7));

        let m = chain.extract().unwrap();
        assert_eq!(&*m.payload, b"only");
        assert!(chain.is_empty());
        assert_eq!(chain.tail_priority(), None);
    }

    #[test]
    fn test_higher_priority_first() {
        let mut chain = MessageChain::new();
        chain.insert(msg(b"A", 5));
        chain.insert(msg(b"B", 5));
        chain.insert(msg(b"C", 10));
        check_invariants(&chain);

        let order = drain(&mut chain);
        assert_eq!(
            order,
            vec![
                (b"C".to_vec(), 10),
                (b"A".to_vec(), 5),
                (b"B".to_vec(), 5),
            ]
        );
    }

    #[test]
    fn test_fifo_within_priority() {
        let mut chain = MessageChain::new();
        for (i, payload) in [b"1", b"2", b"3", b"4"].iter().enumerate() {
            chain.insert(msg(*payload, 3));
            check_invariants(&chain);
            assert_eq!(chain.len(), i + 1);
        }
        let order = drain(&mut chain);
        let payloads: Vec<_> = order.iter().map(|(p, _)| p.clone()).collect();
        assert_eq!(payloads, vec![b"1".to_vec(), b"2".to_vec(), b"3".to_vec(), b"4".to_vec()]);
    }

    #[test]
    fn test_middle_priority_insertion() {
        let mut chain = MessageChain::new();
        chain.insert(msg(b"low", 1));
        chain.insert(msg(b"high", 9));
        chain.insert(msg(b"mid", 5));
        check_invariants(&chain);

        let order = drain(&mut chain);
        assert_eq!(
            order,
            vec![
                (b"high".to_vec(), 9),
                (b"mid".to_vec(), 5),
                (b"low".to_vec(), 1),
            ]
        );
    }

    #[test]
    fn test_tail_advances_past_sole_member_group() {
        let mut chain = MessageChain::new();
        chain.insert(msg(b"top", 9));
        chain.insert(msg(b"X", 4));
        chain.insert(msg(b"Y", 4));

        // Removing the single-member top group must advance the anchor
        // to the tail of the next group.
        let m = chain.extract().unwrap();
        assert_eq!(&*m.payload, b"top");
        check_invariants(&chain);
        assert_eq!(chain.tail_priority(), Some(4));

        // Removing X leaves Y as both head and tail of its group.
        let m = chain.extract().unwrap();
        assert_eq!(&*m.payload, b"X");
        check_invariants(&chain);
        assert_eq!(chain.tail_priority(), Some(4));
    }

    #[test]
    fn test_slot_reuse_after_drain_and_refill() {
        let mut chain = MessageChain::new();
        for round in 0..3 {
            for i in 0..8u32 {
                chain.insert(msg(format!("{round}-{i}").as_bytes(), i % 4));
                check_invariants(&chain);
            }
            let order = drain(&mut chain);
            assert_eq!(order.len(), 8);
            let priorities: Vec<_> = order.iter().map(|(_, p)| *p).collect();
            let mut sorted = priorities.clone();
            sorted.sort_unstable_by(|a, b| b.cmp(a));
            assert_eq!(priorities, sorted);
        }
    }

    #[test]
    fn test_interleaved_insert_extract() {
        let mut chain = MessageChain::new();
        chain.insert(msg(b"a", 2));
        chain.insert(msg(b"b", 8));
        assert_eq!(&*chain.extract().unwrap().payload, b"b");
        chain.insert(msg(b"c", 8));
        chain.insert(msg(b"d", 2));
        check_invariants(&chain);

        let order = drain(&mut chain);
        assert_eq!(
            order,
            vec![
                (b"c".to_vec(), 8),
                (b"a".to_vec(), 2),
                (b"d".to_vec(), 2),
            ]
        );
    }

    #[test]
    fn test_randomized_ordering() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(0x9e3779b9);
        for _ in 0..50 {
            let mut chain = MessageChain::new();
            let mut expected: Vec<(u32, Priority)> = Vec::new();
            for seq in 0..64u32 {
                let priority = rng.gen_range(0..6);
                chain.insert(msg(&seq.to_le_bytes(), priority));
                expected.push((seq, priority));
            }
            check_invariants(&chain);

            // Stable sort reproduces (priority desc, arrival asc)
            expected.sort_by(|a, b| b.1.cmp(&a.1));
            let drained: Vec<(u32, Priority)> = drain(&mut chain)
                .into_iter()
                .map(|(p, prio)| {
                    (u32::from_le_bytes([p[0], p[1], p[2], p[3]]), prio)
                })
                .collect();
            assert_eq!(drained, expected);
        }
    }
}
