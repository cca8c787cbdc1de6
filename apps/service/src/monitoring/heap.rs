use std::sync::Arc;

use super::types::TimedUrl;

/// Binary min-heap of schedule entries keyed by `next_call`.
///
/// Entries carry their own position in the backing array so that the
/// dispatch loop can mutate a key in place and restore heap order with
/// a single O(log n) [`ProbeHeap::fix`] at that index. The index is
/// rewritten on every swap; outside of an operation it always equals
/// the entry's slot in `items`.
///
/// Ties between equal keys break arbitrarily, which is fine — probe
/// timing is approximate to begin with.
pub struct ProbeHeap {
    items: Vec<Arc<TimedUrl>>,
}

impl ProbeHeap {
    /// Builds a heap from an initial set of entries in O(n).
    pub fn new(entries: impl IntoIterator<Item = Arc<TimedUrl>>) -> Self {
        let items: Vec<_> = entries.into_iter().collect();
        for (i, entry) in items.iter().enumerate() {
            entry.set_index(i);
        }
        let mut heap = Self { items };
        for i in (0..heap.items.len() / 2).rev() {
            heap.sift_down(i);
        }
        heap
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The entry with the minimum `next_call`, without removing it.
    pub fn peek(&self) -> Option<Arc<TimedUrl>> {
        self.items.first().cloned()
    }

    pub fn push(&mut self, entry: Arc<TimedUrl>) {
        entry.set_index(self.items.len());
        self.items.push(entry);
        self.sift_up(self.items.len() - 1);
    }

    /// Removes and returns the minimum entry. The backing store is
    /// compacted once occupancy falls below half of capacity, so a
    /// shrinking schedule does not pin its peak memory.
    pub fn pop(&mut self) -> Option<Arc<TimedUrl>> {
        if self.items.is_empty() {
            return None;
        }
        let last = self.items.len() - 1;
        self.swap(0, last);
        let entry = self.items.pop()?;
        entry.set_index(usize::MAX);
        self.sift_down(0);

        if self.items.len() < self.items.capacity() / 2 {
            self.items.shrink_to_fit();
        }

        Some(entry)
    }

    /// Re-establishes heap order after the entry at `index` had its key
    /// changed in place.
    pub fn fix(&mut self, index: usize) {
        if index >= self.items.len() {
            return;
        }
        if !self.sift_down(index) {
            self.sift_up(index);
        }
    }

    fn less(&self, i: usize, j: usize) -> bool {
        self.items[i].next_call() < self.items[j].next_call()
    }

    fn swap(&mut self, i: usize, j: usize) {
        self.items.swap(i, j);
        self.items[i].set_index(i);
        self.items[j].set_index(j);
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if !self.less(i, parent) {
                break;
            }
            self.swap(i, parent);
            i = parent;
        }
    }

    /// Returns whether the entry moved.
    fn sift_down(&mut self, mut i: usize) -> bool {
        let start = i;
        let n = self.items.len();
        loop {
            let left = 2 * i + 1;
            if left >= n {
                break;
            }
            let mut child = left;
            let right = left + 1;
            if right < n && self.less(right, left) {
                child = right;
            }
            if !self.less(child, i) {
                break;
            }
            self.swap(i, child);
            i = child;
        }
        i > start
    }
}
