use std::cell::RefCell;
use std::collections::VecDeque;
use std::ffi::c_void;
use std::mem;
use std::ptr;

use arch::RegisterFile;
use foundation::{Scheduler, Tid, NO_THREAD};
use scheduler_round_robin::RoundRobin;

use crate::config::LwpConfig;
use crate::error::Result;
use crate::frame::{build_initial_frame, LwpFn};
use crate::registry::Registry;
use crate::stack::{stack_size, Stack};
use crate::thread::{ThreadContext, ThreadInfo, ThreadState, ThreadStatus};

thread_local! {
    static RUNTIME: RefCell<Option<Runtime>> = const { RefCell::new(None) };
}

/// What `yield_now` has to do once the runtime borrow is released.
pub(crate) enum Switch {
    Stay,
    Swap {
        from: *mut RegisterFile,
        to: *const RegisterFile,
    },
    /// The outgoing thread has exited; its registers are never loaded again.
    Load { to: *const RegisterFile },
    /// Nothing left to run. Carries the process exit status.
    Exhausted(i32),
}

pub(crate) enum WaitStep {
    Reaped(Tid, ThreadStatus),
    /// The caller is the last thread that could make progress.
    Deadlock,
    /// The caller left the scheduler and must yield until handed a zombie.
    Block,
}

/// Per-OS-thread lifecycle state: every known thread, the active policy, and
/// the zombie and waiter queues.
pub(crate) struct Runtime {
    config: LwpConfig,
    registry: Registry,
    scheduler: Box<dyn Scheduler>,
    current: Option<Tid>,
    started: bool,
    next_tid: Tid,
    zombies: VecDeque<Tid>,
    waiters: VecDeque<Tid>,
}

impl Runtime {
    fn new() -> Self {
        let mut scheduler: Box<dyn Scheduler> = Box::new(RoundRobin::new());
        scheduler.init();
        Self {
            config: LwpConfig::default(),
            registry: Registry::new(),
            scheduler,
            current: None,
            started: false,
            next_tid: NO_THREAD + 1,
            zombies: VecDeque::new(),
            waiters: VecDeque::new(),
        }
    }

    /// Runs `f` against this OS thread's runtime, creating it on first use.
    /// `f` must not switch threads.
    #[inline(always)]
    pub(crate) fn with_mut<R>(f: impl FnOnce(&mut Runtime) -> R) -> R {
        RUNTIME.with(|cell| {
            let mut slot = cell.borrow_mut();
            f(slot.get_or_insert_with(Runtime::new))
        })
    }

    fn issue_tid(&mut self) -> Tid {
        let tid = self.next_tid;
        self.next_tid += 1;
        tid
    }

    pub(crate) fn configure(&mut self, config: LwpConfig) {
        log::debug!("[lwp] configured: {:?}", config);
        self.config = config;
    }

    pub(crate) fn create(&mut self, entry: LwpFn, arg: *mut c_void) -> Result<Tid> {
        let stack = Stack::allocate(stack_size(&self.config))?;
        let top = stack.top();
        let tid = self.issue_tid();

        let mut ctx = Box::new(ThreadContext::new(tid, Some(stack)));
        // Safety: the stack was just mapped and is owned by `ctx`.
        unsafe { build_initial_frame(&mut ctx.regs, top, entry, arg) };
        self.registry.insert(ctx);
        self.scheduler.admit(tid);

        log::debug!("[lwp] created thread {tid}");
        Ok(tid)
    }

    /// Adopts the calling context as a thread. Returns false if already done.
    pub(crate) fn bootstrap(&mut self) -> bool {
        if self.started {
            log::error!("[lwp] start() called more than once, ignoring");
            return false;
        }
        self.started = true;

        let tid = self.issue_tid();
        let mut ctx = Box::new(ThreadContext::new(tid, None));
        ctx.state = ThreadState::Running;
        self.registry.insert(ctx);
        self.current = Some(tid);
        self.scheduler.admit(tid);

        log::debug!("[lwp] bootstrap thread {tid}");
        true
    }

    /// Picks the next thread and updates bookkeeping as if the switch had
    /// already happened.
    pub(crate) fn schedule(&mut self) -> Switch {
        let Some(cur) = self.current else {
            log::warn!("[lwp] yield before start()");
            return Switch::Stay;
        };

        let next = loop {
            let Some(next) = self.scheduler.next() else {
                let code = self
                    .registry
                    .get(cur)
                    .map_or(0, |t| t.status.exit_code());
                return Switch::Exhausted(code.into());
            };
            if self.registry.get(next).is_some() {
                break next;
            }
            log::error!("[lwp] scheduler picked unknown thread {next}, dropping it");
            self.scheduler.remove(next);
        };

        if next == cur {
            return Switch::Stay;
        }

        let to = match self.registry.get_mut(next) {
            Some(ctx) => {
                ctx.state = ThreadState::Running;
                ptr::addr_of!(ctx.regs)
            }
            None => return Switch::Stay,
        };

        let switch = match self.registry.get_mut(cur) {
            Some(ctx) if ctx.state == ThreadState::Zombie => Switch::Load { to },
            Some(ctx) => {
                if ctx.state == ThreadState::Running {
                    ctx.state = ThreadState::Ready;
                }
                Switch::Swap {
                    from: ptr::addr_of_mut!(ctx.regs),
                    to,
                }
            }
            None => Switch::Load { to },
        };

        log::trace!("[lwp] switch {cur} -> {next}");
        self.current = Some(next);
        switch
    }

    /// Marks the current thread terminated and parks it for a waiter.
    /// Returns false when there is no current thread.
    pub(crate) fn retire(&mut self, code: i32) -> bool {
        let Some(cur) = self.current else {
            return false;
        };
        self.scheduler.remove(cur);

        let status = ThreadStatus::terminated(code);
        if let Some(ctx) = self.registry.get_mut(cur) {
            ctx.status = status;
            ctx.state = ThreadState::Zombie;
        }

        match self.waiters.pop_front() {
            Some(waiter) => {
                if let Some(ctx) = self.registry.get_mut(waiter) {
                    ctx.handoff = Some(cur);
                    ctx.state = ThreadState::Ready;
                }
                self.scheduler.admit(waiter);
                log::debug!("[lwp] thread {cur} exited ({status:?}), handed to waiter {waiter}");
            }
            None => {
                self.zombies.push_back(cur);
                log::debug!("[lwp] thread {cur} exited ({status:?})");
            }
        }
        true
    }

    pub(crate) fn begin_wait(&mut self) -> WaitStep {
        if let Some(tid) = self.zombies.pop_front() {
            return match self.reap(tid) {
                Some(status) => WaitStep::Reaped(tid, status),
                None => WaitStep::Deadlock,
            };
        }

        let Some(cur) = self.current else {
            return WaitStep::Deadlock;
        };
        if !self.registry.any_ready_except(cur) {
            return WaitStep::Deadlock;
        }

        self.scheduler.remove(cur);
        if let Some(ctx) = self.registry.get_mut(cur) {
            ctx.state = ThreadState::Blocked;
        }
        self.waiters.push_back(cur);
        log::debug!("[lwp] thread {cur} blocked in wait");
        WaitStep::Block
    }

    /// Reaps the zombie handed to the current thread while it was blocked.
    pub(crate) fn finish_wait(&mut self) -> Option<(Tid, ThreadStatus)> {
        let cur = self.current?;
        let tid = self.registry.get_mut(cur)?.handoff.take()?;
        self.reap(tid).map(|status| (tid, status))
    }

    /// Drops the thread's registry entry, which unmaps its stack.
    fn reap(&mut self, tid: Tid) -> Option<ThreadStatus> {
        let ctx = self.registry.remove(tid)?;
        debug_assert_eq!(ctx.state, ThreadState::Zombie);
        log::debug!("[lwp] reaped thread {tid}");
        Some(ctx.status)
    }

    /// Installs `incoming`, moving every pooled thread over, and hands back
    /// the policy it replaced.
    pub(crate) fn replace_scheduler(
        &mut self,
        mut incoming: Box<dyn Scheduler>,
    ) -> Box<dyn Scheduler> {
        incoming.init();
        let mut moved = 0usize;
        while let Some(tid) = self.scheduler.next() {
            self.scheduler.remove(tid);
            incoming.admit(tid);
            moved += 1;
        }
        self.scheduler.shutdown();
        log::debug!("[lwp] scheduler replaced, {moved} threads migrated");
        mem::replace(&mut self.scheduler, incoming)
    }

    pub(crate) fn scheduler(&self) -> &dyn Scheduler {
        self.scheduler.as_ref()
    }

    pub(crate) fn current(&self) -> Option<Tid> {
        self.current
    }

    pub(crate) fn lookup(&self, tid: Tid) -> Option<ThreadInfo> {
        self.registry.get(tid).map(ThreadContext::info)
    }

    pub(crate) fn thread_count(&self) -> usize {
        self.registry.len()
    }
}
