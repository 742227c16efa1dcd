#![forbid(unsafe_code)]

//! Wait-free snapshot publication.
//!
//! The reflow path rebuilds geometry and drop zones; the drag/hit-test path
//! reads them, possibly from another thread, while a reflow is running.
//! [`SnapshotStore`] keeps the current value behind an atomically swapped
//! `Arc`, so a writer always publishes a fully built value and a reader
//! either sees the old value or the new one, never a mix.
//!
//! ```
//! use tgrid_core::snapshot::SnapshotStore;
//!
//! let store = SnapshotStore::new(vec![1, 2, 3]);
//! let before = store.load();
//! store.store(vec![4]);
//! assert_eq!(*before, vec![1, 2, 3]);
//! assert_eq!(*store.load(), vec![4]);
//! ```

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;

/// A single published value with wait-free reads and atomic replacement.
pub struct SnapshotStore<T> {
    inner: ArcSwap<T>,
}

impl<T> SnapshotStore<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: ArcSwap::from_pointee(value),
        }
    }

    /// Current snapshot. The returned `Arc` stays valid after later stores.
    #[inline]
    pub fn load(&self) -> Arc<T> {
        self.inner.load_full()
    }

    /// Borrow the current snapshot without touching the reference count.
    ///
    /// Prefer this on hot read paths that do not keep the value.
    #[inline]
    pub fn peek(&self) -> arc_swap::Guard<Arc<T>> {
        self.inner.load()
    }

    /// Replace the snapshot.
    #[inline]
    pub fn store(&self, value: T) {
        self.inner.store(Arc::new(value));
    }

    /// Replace the snapshot and return the previous one.
    #[inline]
    pub fn swap(&self, value: T) -> Arc<T> {
        self.inner.swap(Arc::new(value))
    }
}

impl<T: Default> Default for SnapshotStore<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for SnapshotStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SnapshotStore").field(&*self.peek()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn load_returns_initial_value() {
        let store = SnapshotStore::new(7u32);
        assert_eq!(*store.load(), 7);
    }

    #[test]
    fn swap_returns_previous() {
        let store = SnapshotStore::new(String::from("a"));
        let old = store.swap(String::from("b"));
        assert_eq!(old.as_str(), "a");
        assert_eq!(store.peek().as_str(), "b");
    }

    #[test]
    fn readers_never_observe_partial_vectors() {
        // Every published vector is homogeneous; a torn read would mix values.
        let store = Arc::new(SnapshotStore::new(vec![0u32; 64]));
        let barrier = Arc::new(Barrier::new(5));

        let writer = {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for generation in 1..=500u32 {
                    store.store(vec![generation; 64]);
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..2_000 {
                        let snap = store.peek();
                        let first = snap[0];
                        assert!(snap.iter().all(|&v| v == first));
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
        assert_eq!(store.load()[0], 500);
    }
}
