use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::heap::ProbeHeap;
use super::types::TimedUrl;

/// Serializes all heap access behind one exclusive lock so the dispatch
/// and discovery loops can share the schedule at entry granularity.
///
/// Each operation acquires and releases the lock on its own; nothing
/// holds it across I/O or a sleep. That makes peek-then-fix non-atomic
/// across calls: a producer may push an earlier entry in between. The
/// race is benign — the fix targets the entry the caller itself
/// retrieved, so it can cost an extra sleep-and-retry cycle but never
/// dispatches an entry before it is due.
pub struct SyncHeap {
    inner: Mutex<ProbeHeap>,
}

impl SyncHeap {
    pub fn new(heap: ProbeHeap) -> Self {
        Self { inner: Mutex::new(heap) }
    }

    fn lock(&self) -> MutexGuard<'_, ProbeHeap> {
        // No invariant outlives a guard, so a poisoned lock is still usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn peek(&self) -> Option<Arc<TimedUrl>> {
        self.lock().peek()
    }

    pub fn push(&self, entry: Arc<TimedUrl>) {
        self.lock().push(entry);
    }

    pub fn pop(&self) -> Option<Arc<TimedUrl>> {
        self.lock().pop()
    }

    pub fn fix(&self, index: usize) {
        self.lock().fix(index);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
