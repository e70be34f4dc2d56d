//! Priority queue of pending scheduler requests.
//!
//! Smaller priority values dispatch first; ties resolve in submission
//! order. Owned by the arbiter task, so no interior locking.

use std::{cmp::Ordering, collections::BinaryHeap};

use super::arbiter::Request;

pub(crate) struct RequestQueue {
    heap: BinaryHeap<QueueEntry>,
}

struct QueueEntry {
    request: Request,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.request.priority == other.request.priority && self.request.seq == other.request.seq
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    // Reversed so the BinaryHeap max is the minimum (priority, seq) pair.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .request
            .priority
            .cmp(&self.request.priority)
            .then_with(|| other.request.seq.cmp(&self.request.seq))
    }
}

impl RequestQueue {
    pub fn new() -> Self {
        RequestQueue {
            heap: BinaryHeap::new(),
        }
    }

    pub fn push(&mut self, request: Request) {
        self.heap.push(QueueEntry { request });
    }

    pub fn peek(&self) -> Option<&Request> {
        self.heap.peek().map(|entry| &entry.request)
    }

    pub fn pop(&mut self) -> Option<Request> {
        self.heap.pop().map(|entry| entry.request)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }
}
