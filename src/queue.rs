//! Draw-order priority queue.
//!
//! A binary min-heap keyed by `(priority, insertion sequence)` with an
//! auxiliary position index, so arbitrary bars can be removed or repriced in
//! O(log n) when they abort or call `set_priority` mid-run.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
struct Entry {
    id: u64,
    priority: i64,
    seq: u64,
}

impl Entry {
    fn key(&self) -> (i64, u64) {
        (self.priority, self.seq)
    }
}

/// Min-heap of bar ids ordered by draw priority; lower priorities draw
/// first, ties break by insertion order.
#[derive(Debug, Default)]
pub(crate) struct PriorityQueue {
    heap: Vec<Entry>,
    pos: HashMap<u64, usize>,
    next_seq: u64,
}

impl PriorityQueue {
    /// Insert a bar. A duplicate id is repriced instead.
    pub(crate) fn insert(&mut self, id: u64, priority: i64) {
        if self.pos.contains_key(&id) {
            self.update(id, priority);
            return;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        let entry = Entry { id, priority, seq };
        self.heap.push(entry);
        let i = self.heap.len() - 1;
        self.pos.insert(id, i);
        self.sift_up(i);
    }

    /// Remove a bar; returns false if it was not queued.
    pub(crate) fn remove(&mut self, id: u64) -> bool {
        let Some(i) = self.pos.remove(&id) else {
            return false;
        };
        let last = self.heap.len() - 1;
        if i != last {
            self.heap.swap(i, last);
            self.pos.insert(self.heap[i].id, i);
        }
        self.heap.pop();
        if i < self.heap.len() {
            self.sift_down(i);
            self.sift_up(i);
        }
        true
    }

    /// Reprice a bar, keeping its original insertion sequence so the
    /// tie-break stays stable. Returns false if it was not queued.
    pub(crate) fn update(&mut self, id: u64, priority: i64) -> bool {
        let Some(&i) = self.pos.get(&id) else {
            return false;
        };
        self.heap[i].priority = priority;
        self.sift_down(i);
        self.sift_up(i);
        true
    }

    pub(crate) fn contains(&self, id: u64) -> bool {
        self.pos.contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    /// Snapshot of the full draw order for one tick.
    pub(crate) fn sorted_ids(&self) -> Vec<u64> {
        let mut entries = self.heap.clone();
        entries.sort_by_key(Entry::key);
        entries.into_iter().map(|e| e.id).collect()
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.heap[i].key() >= self.heap[parent].key() {
                break;
            }
            self.swap(i, parent);
            i = parent;
        }
    }

    fn sift_down(&mut self, mut i: usize) {
        loop {
            let (l, r) = (2 * i + 1, 2 * i + 2);
            let mut smallest = i;
            if l < self.heap.len() && self.heap[l].key() < self.heap[smallest].key() {
                smallest = l;
            }
            if r < self.heap.len() && self.heap[r].key() < self.heap[smallest].key() {
                smallest = r;
            }
            if smallest == i {
                break;
            }
            self.swap(i, smallest);
            i = smallest;
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.pos.insert(self.heap[a].id, a);
        self.pos.insert(self.heap[b].id, b);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draws_lowest_priority_first() {
        let mut q = PriorityQueue::default();
        q.insert(1, 5);
        q.insert(2, -3);
        q.insert(3, 0);
        assert_eq!(q.sorted_ids(), vec![2, 3, 1]);
    }

    #[test]
    fn equal_priorities_keep_insertion_order() {
        let mut q = PriorityQueue::default();
        for id in 0..6 {
            q.insert(id, 7);
        }
        assert_eq!(q.sorted_ids(), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn update_moves_a_bar_without_losing_its_seq() {
        let mut q = PriorityQueue::default();
        q.insert(1, 0);
        q.insert(2, 0);
        q.insert(3, 0);
        assert!(q.update(3, -1));
        assert_eq!(q.sorted_ids(), vec![3, 1, 2]);
        // back to the shared priority: insertion order applies again
        assert!(q.update(3, 0));
        assert_eq!(q.sorted_ids(), vec![1, 2, 3]);
    }

    #[test]
    fn remove_arbitrary_element() {
        let mut q = PriorityQueue::default();
        q.insert(1, 1);
        q.insert(2, 2);
        q.insert(3, 3);
        assert!(q.remove(2));
        assert!(!q.remove(2));
        assert!(!q.contains(2));
        assert_eq!(q.sorted_ids(), vec![1, 3]);
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn update_unknown_id_is_rejected() {
        let mut q = PriorityQueue::default();
        assert!(!q.update(9, 1));
    }
}
