//! Caller-owned accumulating state, updated through read-modify-write merges.

use std::sync::Arc;

use parking_lot::Mutex;

/// Setter-shaped consumer boundary. A consumer either replaces the value or
/// merges a function of the previous value; the merge form is what lets
/// out-of-order chain completions accumulate without losing each other's
/// contributions.
pub trait Sink<T>: Send + Sync {
    fn set(&self, value: T);
    fn merge(&self, update: Box<dyn FnOnce(&T) -> T + Send>);
}

/// Default [`Sink`] backed by a mutex. `merge` holds the lock across the
/// whole read-compute-write, so concurrent writers serialize instead of
/// clobbering each other.
pub struct StateCell<T> {
    inner: Arc<Mutex<T>>,
}

impl<T> StateCell<T> {
    pub fn new(initial: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(initial)),
        }
    }

    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let mut guard = self.inner.lock();
        let next = f(&guard);
        *guard = next;
    }

    pub fn snapshot(&self) -> T
    where
        T: Clone,
    {
        self.inner.lock().clone()
    }
}

impl<T: Default> Default for StateCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Clone for StateCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send> Sink<T> for StateCell<T> {
    fn set(&self, value: T) {
        *self.inner.lock() = value;
    }

    fn merge(&self, update: Box<dyn FnOnce(&T) -> T + Send>) {
        self.update(update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn overlapping_merges_lose_nothing() {
        let cell: StateCell<Vec<u32>> = StateCell::default();
        let mut handles = Vec::new();
        for n in 0..8u32 {
            let cell = cell.clone();
            handles.push(tokio::spawn(async move {
                cell.merge(Box::new(move |prev| {
                    let mut next = prev.clone();
                    next.push(n);
                    next
                }));
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        let mut result = cell.snapshot();
        result.sort_unstable();
        assert_eq!(result, (0..8).collect::<Vec<u32>>());
    }

    #[test]
    fn set_replaces_wholesale() {
        let cell = StateCell::new(1u32);
        cell.set(5);
        assert_eq!(cell.snapshot(), 5);
    }

    #[test]
    fn cell_stays_usable_after_a_panicking_merge() {
        let cell = StateCell::new(vec![1u32]);
        let sibling = cell.clone();
        let worker = std::thread::spawn(move || {
            sibling.merge(Box::new(|_| panic!("merge failed mid-update")));
        });
        assert!(worker.join().is_err());
        cell.merge(Box::new(|prev| {
            let mut next = prev.clone();
            next.push(2);
            next
        }));
        assert_eq!(cell.snapshot(), vec![1, 2]);
    }
}
