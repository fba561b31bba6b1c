//! Plan-order reassembly buffer.
//! Restores plan order for records that complete out of order.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

/// ReorderBuffer collects items keyed by their plan index and releases them in order.
///
/// Nothing is ever evicted: every submitted index is eventually returned either by
/// [`push`](Self::push) or by [`drain_remaining`](Self::drain_remaining).
#[derive(Debug)]
pub struct ReorderBuffer<T> {
    next_index: usize,
    window: BTreeMap<usize, T>,
}

impl<T> ReorderBuffer<T> {
    /// Create a new buffer expecting `initial_index` first.
    pub fn new(initial_index: usize) -> Self {
        Self { next_index: initial_index, window: BTreeMap::new() }
    }

    /// Push item with `index`. Returns the items now ready, in order.
    ///
    /// Indices below the next expected one (duplicates) are dropped.
    pub fn push(&mut self, index: usize, item: T) -> Vec<T> {
        if index < self.next_index {
            return Vec::new();
        }
        self.window.insert(index, item);
        self.drain_ready()
    }

    fn drain_ready(&mut self) -> Vec<T> {
        let mut ready = Vec::new();
        while let Some(item) = self.window.remove(&self.next_index) {
            ready.push(item);
            self.next_index += 1;
        }
        ready
    }

    /// Release everything still held, in index order, skipping over gaps.
    pub fn drain_remaining(&mut self) -> Vec<T> {
        let held = std::mem::take(&mut self.window);
        if let Some((&last, _)) = held.iter().next_back() {
            self.next_index = last + 1;
        }
        held.into_values().collect()
    }

    /// Number of items waiting for an earlier index.
    pub fn pending(&self) -> usize {
        self.window.len()
    }

    pub fn next_index(&self) -> usize {
        self.next_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_order_delivery() {
        let mut buf = ReorderBuffer::new(0);
        // Push out-of-order: 1,0,2
        assert!(buf.push(1, 'b').is_empty());
        assert_eq!(buf.push(0, 'a'), vec!['a', 'b']);
        assert_eq!(buf.push(2, 'c'), vec!['c']);
        assert_eq!(buf.pending(), 0);
    }

    #[test]
    fn duplicates_dropped_and_gaps_drained() {
        let mut buf = ReorderBuffer::new(0);
        assert_eq!(buf.push(0, 0), vec![0]);
        assert!(buf.push(0, 99).is_empty());
        assert!(buf.push(4, 4).is_empty());
        assert!(buf.push(2, 2).is_empty());
        assert_eq!(buf.pending(), 2);
        assert_eq!(buf.drain_remaining(), vec![2, 4]);
        assert_eq!(buf.next_index(), 5);
    }
}
