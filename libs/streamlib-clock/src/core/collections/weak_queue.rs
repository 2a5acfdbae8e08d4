// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// Ordered queue of weak references.
///
/// Holding an element here never keeps it alive. Dead entries are skipped by
/// every read and compacted away lazily.
pub struct WeakQueue<T: ?Sized> {
    items: Mutex<Vec<Weak<T>>>,
}

impl<T: ?Sized> WeakQueue<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, item: &Arc<T>) {
        self.items.lock().push(Arc::downgrade(item));
    }

    /// Live elements, in insertion order. Compacts dead entries.
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        let mut items = self.items.lock();
        let mut live = Vec::with_capacity(items.len());
        items.retain(|weak| match weak.upgrade() {
            Some(item) => {
                live.push(item);
                true
            }
            None => false,
        });
        live
    }

    /// Number of live elements.
    pub fn len(&self) -> usize {
        let mut items = self.items.lock();
        items.retain(|weak| weak.strong_count() > 0);
        items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keep only live elements matching `keep`.
    pub fn retain<F>(&self, mut keep: F)
    where
        F: FnMut(&Arc<T>) -> bool,
    {
        self.items.lock().retain(|weak| match weak.upgrade() {
            Some(item) => keep(&item),
            None => false,
        });
    }

    pub fn contains(&self, item: &Arc<T>) -> bool {
        self.items
            .lock()
            .iter()
            .any(|weak| std::ptr::addr_eq(weak.as_ptr(), Arc::as_ptr(item)))
    }

    /// Remove every element, handing each live one to `f`.
    ///
    /// Re-scans until empty, so elements pushed by `f` are processed too.
    pub fn flush<F>(&self, mut f: F)
    where
        F: FnMut(Arc<T>),
    {
        loop {
            let batch = std::mem::take(&mut *self.items.lock());
            if batch.is_empty() {
                return;
            }
            for item in batch.iter().filter_map(Weak::upgrade) {
                f(item);
            }
        }
    }
}

impl<T: ?Sized> Default for WeakQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
