use arch::RegisterFile;
use foundation::{ArchContext, Tid};

use crate::stack::Stack;

const TERM_OFFSET: u32 = 8;
const TERM_MASK: u32 = (1 << TERM_OFFSET) - 1;

/// Exit status of a thread. Written once, when the thread exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadStatus {
    Live,
    Terminated(u8),
}

impl ThreadStatus {
    /// Truncates `code` to the low 8 bits, like a process exit status.
    pub fn terminated(code: i32) -> Self {
        ThreadStatus::Terminated((code as u32 & TERM_MASK) as u8)
    }

    pub fn is_terminated(self) -> bool {
        matches!(self, ThreadStatus::Terminated(_))
    }

    /// Exit code, or 0 while the thread is still live.
    pub fn exit_code(self) -> u8 {
        match self {
            ThreadStatus::Live => 0,
            ThreadStatus::Terminated(code) => code,
        }
    }

    /// Packed form: terminated flag above the low 8 bits holding the code.
    pub fn to_raw(self) -> u32 {
        match self {
            ThreadStatus::Live => 0,
            ThreadStatus::Terminated(code) => (1 << TERM_OFFSET) | code as u32,
        }
    }

    pub fn from_raw(raw: u32) -> Self {
        if (raw >> TERM_OFFSET) & 1 == 1 {
            ThreadStatus::Terminated((raw & TERM_MASK) as u8)
        } else {
            ThreadStatus::Live
        }
    }
}

/// Where a thread currently sits in the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Held by the active scheduler, waiting for its turn.
    Ready,
    Running,
    /// Parked in `wait` and out of the scheduler until an exiting thread wakes it.
    Blocked,
    /// Exited, not yet reaped.
    Zombie,
}

pub struct ThreadContext {
    pub(crate) tid: Tid,
    pub(crate) regs: RegisterFile,
    /// `None` for the bootstrap thread, which runs on the process stack.
    pub(crate) stack: Option<Stack>,
    pub(crate) status: ThreadStatus,
    pub(crate) state: ThreadState,
    /// Zombie handed directly to this thread while it was blocked in `wait`.
    pub(crate) handoff: Option<Tid>,
}

impl ThreadContext {
    pub(crate) fn new(tid: Tid, stack: Option<Stack>) -> Self {
        Self {
            tid,
            regs: RegisterFile::new(),
            stack,
            status: ThreadStatus::Live,
            state: ThreadState::Ready,
            handoff: None,
        }
    }

    pub(crate) fn info(&self) -> ThreadInfo {
        ThreadInfo {
            tid: self.tid,
            status: self.status,
            state: self.state,
            stack_size: self.stack.as_ref().map_or(0, Stack::size),
        }
    }
}

/// Point-in-time view of a thread, as returned by `tid2thread`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadInfo {
    pub tid: Tid,
    pub status: ThreadStatus,
    pub state: ThreadState,
    /// Zero for the bootstrap thread.
    pub stack_size: usize,
}
