use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use uuid::Uuid;

/// A url's next-probe obligation, as held by the schedule heap.
///
/// `next_call` and the heap index are interior-mutable: the heap owns
/// the index outright and rewrites it on every swap, while `next_call`
/// is only rewritten by the dispatch loop for the entry it just fired.
#[derive(Debug)]
pub struct TimedUrl {
    pub url_id: Uuid,
    pub url: String,
    pub user_id: Uuid,
    pub interval: Duration,
    next_call: Mutex<Instant>,
    index: AtomicUsize,
}

impl TimedUrl {
    /// A fresh entry never fires immediately: its first due time is one
    /// full interval from now.
    pub fn new(url_id: Uuid, url: String, user_id: Uuid, interval: Duration) -> Self {
        Self {
            url_id,
            url,
            user_id,
            interval,
            next_call: Mutex::new(Instant::now() + interval),
            index: AtomicUsize::new(usize::MAX),
        }
    }

    pub fn next_call(&self) -> Instant {
        *self.next_call.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn set_next_call(&self, at: Instant) {
        *self.next_call.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = at;
    }

    pub(crate) fn index(&self) -> usize {
        self.index.load(Ordering::Relaxed)
    }

    pub(crate) fn set_index(&self, index: usize) {
        self.index.store(index, Ordering::Relaxed);
    }
}

/// One probe request, produced by the dispatch loop and consumed by
/// exactly one worker.
#[derive(Debug, Clone)]
pub struct Task {
    pub url_id: Uuid,
    pub url: String,
    pub user_id: Uuid,
}

/// Outcome of one probe attempt that reached a status line. Attempts
/// that failed before receiving a status never become a result.
#[derive(Debug)]
pub struct ProbeResult {
    pub task: Task,
    pub status_code: u16,
    pub body: String,
}
