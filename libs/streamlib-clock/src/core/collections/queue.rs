// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use parking_lot::Mutex;

/// Ordered, thread-safe multiset.
///
/// The lock is only held while the backing vector is touched, never while
/// user code runs, so callbacks invoked from [`Queue::flush`] or on elements
/// of a [`Queue::snapshot`] may push back into the same queue.
pub struct Queue<T> {
    items: Mutex<Vec<T>>,
}

impl<T> Queue<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, item: T) {
        self.items.lock().push(item);
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Keep only the elements matching `keep`.
    pub fn retain<F>(&self, keep: F)
    where
        F: FnMut(&T) -> bool,
    {
        self.items.lock().retain(keep);
    }

    /// Modify every element in place.
    pub fn update<F>(&self, f: F)
    where
        F: FnMut(&mut T),
    {
        self.items.lock().iter_mut().for_each(f);
    }

    pub fn any<F>(&self, predicate: F) -> bool
    where
        F: FnMut(&T) -> bool,
    {
        self.items.lock().iter().any(predicate)
    }

    /// Remove and return the current contents, once.
    ///
    /// Elements pushed while the caller processes the returned batch stay in
    /// the queue for the next drain.
    pub fn drain(&self) -> Vec<T> {
        std::mem::take(&mut *self.items.lock())
    }

    /// Remove every element, handing each to `f`.
    ///
    /// Elements pushed by `f` are processed in the same call: the queue is
    /// re-scanned until it is empty.
    pub fn flush<F>(&self, mut f: F)
    where
        F: FnMut(T),
    {
        loop {
            let batch = self.drain();
            if batch.is_empty() {
                return;
            }
            for item in batch {
                f(item);
            }
        }
    }

    /// Append every element of `other`, leaving it empty.
    pub fn append_from(&self, other: &Queue<T>) {
        let moved = other.drain();
        self.items.lock().extend(moved);
    }
}

impl<T: Clone> Queue<T> {
    pub fn snapshot(&self) -> Vec<T> {
        self.items.lock().clone()
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_snapshot_preserve_order() {
        let queue = Queue::new();
        queue.push(1);
        queue.push(2);
        queue.push(3);
        assert_eq!(queue.snapshot(), vec![1, 2, 3]);
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_retain_filters_in_place() {
        let queue = Queue::new();
        for i in 0..6 {
            queue.push(i);
        }
        queue.retain(|i| i % 2 == 0);
        assert_eq!(queue.snapshot(), vec![0, 2, 4]);
    }

    #[test]
    fn test_flush_processes_items_pushed_during_iteration() {
        let queue = Queue::new();
        queue.push(3u32);

        let mut seen = Vec::new();
        queue.flush(|n| {
            seen.push(n);
            if n > 0 {
                queue.push(n - 1);
            }
        });

        assert_eq!(seen, vec![3, 2, 1, 0]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drain_leaves_items_pushed_afterwards() {
        let queue = Queue::new();
        queue.push("a");

        for item in queue.drain() {
            assert_eq!(item, "a");
            queue.push("b");
        }

        assert_eq!(queue.snapshot(), vec!["b"]);
    }

    #[test]
    fn test_append_from_moves_contents() {
        let left = Queue::new();
        let right = Queue::new();
        left.push(1);
        right.push(2);
        right.push(3);

        left.append_from(&right);

        assert_eq!(left.snapshot(), vec![1, 2, 3]);
        assert!(right.is_empty());
    }
}
