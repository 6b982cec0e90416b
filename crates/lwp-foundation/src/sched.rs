/// Lightweight thread id. Issued from 1 upward and never reused.
pub type Tid = usize;

/// Always-invalid thread id.
pub const NO_THREAD: Tid = 0;

/// A scheduling policy: the pool of runnable threads and the rule for picking
/// the next one.
///
/// Exactly one policy is active per runtime. The runtime is the only caller and
/// never calls into a policy while a switch is in progress, so implementations
/// need no synchronization. Implementations must not call back into the thread
/// runtime from any of these methods.
pub trait Scheduler {
    /// Called when the policy becomes active, before any thread is admitted.
    fn init(&mut self) {}

    /// Called when the policy is replaced, after its pool has been drained.
    fn shutdown(&mut self) {}

    /// Add `tid` to the pool. Admitting a thread already in the pool is a no-op.
    fn admit(&mut self, tid: Tid);

    /// Drop `tid` from the pool. Removing an absent thread is a no-op.
    fn remove(&mut self, tid: Tid);

    /// Pick the next thread to run, re-queueing it as the policy sees fit.
    /// Returns `None` only when the pool is empty.
    fn next(&mut self) -> Option<Tid>;

    /// Number of threads currently in the pool.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
