//! Deadline queue for the node's scheduled work.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
struct Entry<T> {
    at: Instant,
    seq: u64,
    event: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        (self.at, self.seq) == (other.at, other.seq)
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.at, self.seq).cmp(&(other.at, other.seq))
    }
}

/// Events ordered by deadline. Events sharing a deadline come out in the
/// order they were scheduled.
#[derive(Debug)]
pub struct TimerQueue<T> {
    heap: BinaryHeap<Reverse<Entry<T>>>,
    next_seq: u64,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, at: Instant, event: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Entry { at, seq, event }));
    }

    pub fn schedule_after(&mut self, now: Instant, delay: Duration, event: T) {
        self.schedule(now + delay, event);
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse(entry)| entry.at)
    }

    /// Remove and return every event due at `now`.
    pub fn pop_due(&mut self, now: Instant) -> Vec<T> {
        let mut due = Vec::new();
        while self.heap.peek().is_some_and(|Reverse(entry)| entry.at <= now) {
            if let Some(Reverse(entry)) = self.heap.pop() {
                due.push(entry.event);
            }
        }
        due
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_deadline_then_insertion_order() {
        let start = Instant::now();
        let mut queue = TimerQueue::new();
        queue.schedule_after(start, Duration::from_secs(5), "late");
        queue.schedule_after(start, Duration::from_secs(1), "first");
        queue.schedule_after(start, Duration::from_secs(1), "second");

        assert_eq!(queue.next_deadline(), Some(start + Duration::from_secs(1)));
        assert!(queue.pop_due(start).is_empty());
        assert_eq!(queue.pop_due(start + Duration::from_secs(2)), vec!["first", "second"]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop_due(start + Duration::from_secs(5)), vec!["late"]);
        assert!(queue.is_empty());
        assert_eq!(queue.next_deadline(), None);
    }
}
