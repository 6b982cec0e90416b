use alloc::collections::VecDeque;

use foundation::{Scheduler, Tid};

/// FIFO pool. `next` takes the head and puts it back at the tail, so repeated
/// calls cycle through admitted threads in admission order and every thread
/// runs again before any thread runs twice.
#[derive(Debug, Default)]
pub struct RoundRobin {
    pool: VecDeque<Tid>,
}

impl RoundRobin {
    pub const fn new() -> Self {
        Self {
            pool: VecDeque::new(),
        }
    }

    fn position(&self, tid: Tid) -> Option<usize> {
        self.pool.iter().position(|&t| t == tid)
    }
}

impl Scheduler for RoundRobin {
    fn init(&mut self) {
        self.pool.clear();
    }

    fn shutdown(&mut self) {
        if !self.pool.is_empty() {
            log::warn!("[rr] shutdown with {} threads still pooled", self.pool.len());
        }
        self.pool.clear();
    }

    fn admit(&mut self, tid: Tid) {
        if self.position(tid).is_none() {
            self.pool.push_back(tid);
        }
    }

    fn remove(&mut self, tid: Tid) {
        if let Some(idx) = self.position(tid) {
            self.pool.remove(idx);
        }
    }

    fn next(&mut self) -> Option<Tid> {
        let tid = self.pool.pop_front()?;
        self.pool.push_back(tid);
        Some(tid)
    }

    fn len(&self) -> usize {
        self.pool.len()
    }
}
