// src/dbqueue.rs
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};

use crate::orderbook::TopOfBook;

/// One pending database insert: the top-of-book at snapshot time.
#[derive(Debug, Clone)]
pub struct SnapshotWrite {
    pub ts_us: i64,
    pub symbol: String,
    pub tob: TopOfBook,
}

/// Bounded FIFO between the replay pipeline (producer) and the database
/// writer thread (consumer). The producer never blocks: on overflow the
/// oldest element is dropped, trading DB completeness for apply latency.
/// After `stop`, the consumer drains whatever remains and then gets `None`.
pub struct SnapshotQueue {
    inner: Mutex<VecDeque<SnapshotWrite>>,
    cv: Condvar,
    cap: usize,
    stopped: AtomicBool,
}

impl SnapshotQueue {
    pub fn new(cap: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(cap.min(4096))),
            cv: Condvar::new(),
            cap: cap.max(1),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn push(&self, item: SnapshotWrite) {
        {
            let mut q = self.inner.lock().unwrap();
            while q.len() >= self.cap {
                q.pop_front();
            }
            q.push_back(item);
        }
        self.cv.notify_one();
    }

    /// Block until an item is available or the queue is stopped and empty.
    pub fn pop_blocking(&self) -> Option<SnapshotWrite> {
        let mut q = self.inner.lock().unwrap();
        loop {
            if let Some(item) = q.pop_front() {
                return Some(item);
            }
            if self.stopped.load(Ordering::Relaxed) {
                return None;
            }
            q = self.cv.wait(q).unwrap();
        }
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.cv.notify_all();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}
