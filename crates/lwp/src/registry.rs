use std::collections::BTreeMap;

use foundation::Tid;

use crate::thread::{ThreadContext, ThreadState};

/// Master table of every thread that has not been reaped, keyed by id.
///
/// Contexts are boxed so their register files keep a fixed address while a
/// switch is in flight, whatever happens to the map.
#[derive(Default)]
pub struct Registry {
    threads: BTreeMap<Tid, Box<ThreadContext>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ctx: Box<ThreadContext>) {
        let prev = self.threads.insert(ctx.tid, ctx);
        debug_assert!(prev.is_none(), "thread id registered twice");
    }

    pub fn remove(&mut self, tid: Tid) -> Option<Box<ThreadContext>> {
        self.threads.remove(&tid)
    }

    pub fn get(&self, tid: Tid) -> Option<&ThreadContext> {
        self.threads.get(&tid).map(Box::as_ref)
    }

    pub fn get_mut(&mut self, tid: Tid) -> Option<&mut ThreadContext> {
        self.threads.get_mut(&tid).map(Box::as_mut)
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    /// Whether any thread other than `except` is waiting in the scheduler.
    pub fn any_ready_except(&self, except: Tid) -> bool {
        self.threads
            .values()
            .any(|t| t.tid != except && t.state == ThreadState::Ready)
    }
}
