use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

/// Bounded FIFO of recently accepted keys.
///
/// Keys may be pushed more than once; a key stays tabu while at least one of
/// its entries is still in the queue. A capacity of 0 stores nothing.
#[derive(Debug, Clone)]
pub struct TabuList<K> {
    capacity: usize,
    queue: VecDeque<K>,
    counts: HashMap<K, usize>,
}

impl<K: Eq + Hash + Clone> TabuList<K> {
    pub fn new(capacity: usize) -> Self {
        TabuList {
            capacity,
            queue: VecDeque::with_capacity(capacity),
            counts: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.counts.contains_key(key)
    }

    /// Append a key, evicting the oldest entry when full.
    pub fn push(&mut self, key: K) {
        if self.capacity == 0 {
            return;
        }
        if self.queue.len() == self.capacity {
            if let Some(old) = self.queue.pop_front() {
                self.forget(&old);
            }
        }
        *self.counts.entry(key.clone()).or_insert(0) += 1;
        self.queue.push_back(key);
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.counts.clear();
    }

    fn forget(&mut self, key: &K) {
        if let Some(count) = self.counts.get_mut(key) {
            *count -= 1;
            if *count == 0 {
                self.counts.remove(key);
            }
        }
    }
}
