//! Handle tables.
//!
//! Every kernel object lives in the table of its kind under a handle drawn
//! from one process-wide sequence. Handles are never reused, so a stale or
//! foreign handle is always reported as [`KernelError::UnknownHandle`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use osal::{KernelError, KernelResult, RawHandle};
use parking_lot::Mutex;

static NEXT_HANDLE: AtomicUsize = AtomicUsize::new(1);

/// Draws a fresh handle.
pub(crate) fn next_handle() -> KernelResult<RawHandle> {
    RawHandle::new(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed)).ok_or(KernelError::NoMemory)
}

pub(crate) struct Table<T> {
    objects: Mutex<HashMap<RawHandle, Arc<T>>>,
}

impl<T> Table<T> {
    pub(crate) fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
        }
    }

    /// Stores `object` under a new handle.
    pub(crate) fn insert(&self, object: T) -> KernelResult<RawHandle> {
        let handle = next_handle()?;
        self.insert_at(handle, object);
        Ok(handle)
    }

    pub(crate) fn insert_at(&self, handle: RawHandle, object: T) {
        self.objects.lock().insert(handle, Arc::new(object));
    }

    pub(crate) fn get(&self, handle: RawHandle) -> KernelResult<Arc<T>> {
        self.objects
            .lock()
            .get(&handle)
            .cloned()
            .ok_or(KernelError::UnknownHandle)
    }

    pub(crate) fn remove(&self, handle: RawHandle) -> KernelResult<Arc<T>> {
        self.objects
            .lock()
            .remove(&handle)
            .ok_or(KernelError::UnknownHandle)
    }

    pub(crate) fn contains(&self, handle: RawHandle) -> bool {
        self.objects.lock().contains_key(&handle)
    }

    pub(crate) fn len(&self) -> usize {
        self.objects.lock().len()
    }

    /// Empties the table, handing back whatever was still in it.
    pub(crate) fn drain(&self) -> Vec<(RawHandle, Arc<T>)> {
        self.objects.lock().drain().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_never_reused() {
        let table = Table::new();
        let first = table.insert("a").unwrap();
        table.remove(first).unwrap();
        let second = table.insert("b").unwrap();
        assert_ne!(first, second);
        assert_eq!(table.get(first).err(), Some(KernelError::UnknownHandle));
        assert_eq!(*table.get(second).unwrap(), "b");
    }

    #[test]
    fn handles_are_unique_across_tables() {
        let numbers = Table::new();
        let words = Table::new();
        let number = numbers.insert(1).unwrap();
        let word = words.insert("one").unwrap();
        assert_ne!(number, word);
        assert!(!words.contains(number));
        assert_eq!(numbers.remove(word).err(), Some(KernelError::UnknownHandle));
    }
}
