use std::ffi::c_void;
use std::process;

use foundation::{Scheduler, Tid};

use crate::config::LwpConfig;
use crate::error::Result;
use crate::frame::{self, LwpFn};
use crate::runtime::{Runtime, Switch, WaitStep};
use crate::thread::{ThreadInfo, ThreadStatus};

/// Replace the runtime settings. Applies to threads created afterwards.
pub fn configure(config: LwpConfig) {
    Runtime::with_mut(|rt| rt.configure(config));
}

/// Create a thread that will run `entry(arg)` and admit it to the active
/// scheduler. It first runs when the scheduler picks it.
pub fn create(entry: LwpFn, arg: *mut c_void) -> Result<Tid> {
    Runtime::with_mut(|rt| rt.create(entry, arg))
}

/// `create` for a closure. A panic inside `f` ends the thread with
/// [`PANIC_EXIT_CODE`](crate::PANIC_EXIT_CODE).
pub fn spawn<F>(f: F) -> Result<Tid>
where
    F: FnOnce() -> i32 + 'static,
{
    let arg = frame::box_entry(f);
    create(frame::run_boxed, arg).inspect_err(|_| unsafe { frame::drop_entry(arg) })
}

/// Turn the calling context into the bootstrap thread and yield to the
/// scheduler. Call once per OS thread, before `yield_now`, `exit` or `wait`.
pub fn start() {
    if Runtime::with_mut(Runtime::bootstrap) {
        yield_now();
    }
}

/// Give up the processor to the next thread the scheduler picks.
///
/// When nothing is runnable the process exits, using the current thread's
/// exit code as its status.
pub fn yield_now() {
    match Runtime::with_mut(Runtime::schedule) {
        Switch::Stay => {}
        Switch::Swap { from, to } => unsafe { arch::swap_rfiles(from, to) },
        Switch::Load { to } => unsafe { arch::load_rfile(to) },
        Switch::Exhausted(code) => {
            log::debug!("[lwp] no runnable threads, exiting with {code}");
            log::logger().flush();
            process::exit(code);
        }
    }
}

/// Terminate the calling thread with `code` (low 8 bits kept). Destructors of
/// values live on the thread's stack do not run.
pub fn exit(code: i32) -> ! {
    if !Runtime::with_mut(|rt| rt.retire(code)) {
        process::exit(code & 0xFF);
    }
    yield_now();
    unreachable!("[lwp] terminated thread was rescheduled")
}

/// Reap a terminated thread, oldest first, blocking until one exists.
///
/// Returns `None` instead of blocking when no other thread could ever exit.
pub fn wait() -> Option<(Tid, ThreadStatus)> {
    match Runtime::with_mut(Runtime::begin_wait) {
        WaitStep::Reaped(tid, status) => Some((tid, status)),
        WaitStep::Deadlock => None,
        WaitStep::Block => {
            yield_now();
            let reaped = Runtime::with_mut(Runtime::finish_wait);
            if reaped.is_none() {
                log::error!("[lwp] woke from wait without a handed-off thread");
            }
            reaped
        }
    }
}

/// Install `policy` (round-robin when `None`), migrating every pooled thread
/// to it. The replaced policy is handed back, already shut down and empty.
pub fn set_scheduler(policy: Option<Box<dyn Scheduler>>) -> Box<dyn Scheduler> {
    let incoming = policy.unwrap_or_else(|| Box::new(scheduler_round_robin::RoundRobin::new()));
    Runtime::with_mut(|rt| rt.replace_scheduler(incoming))
}

/// Inspect the active policy.
pub fn with_scheduler<R>(f: impl FnOnce(&dyn Scheduler) -> R) -> R {
    Runtime::with_mut(|rt| f(rt.scheduler()))
}

/// Id of the calling thread, or `None` before `start`.
pub fn gettid() -> Option<Tid> {
    Runtime::with_mut(|rt| rt.current())
}

/// Look up any thread that has not been reaped, wherever it is queued.
pub fn tid2thread(tid: Tid) -> Option<ThreadInfo> {
    Runtime::with_mut(|rt| rt.lookup(tid))
}

/// Threads known to the runtime, including blocked and unreaped ones.
pub fn thread_count() -> usize {
    Runtime::with_mut(|rt| rt.thread_count())
}
