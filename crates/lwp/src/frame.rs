//! First-run setup for new threads.
//!
//! The control transfer primitive only restores registers and returns through
//! whatever the target stack holds, so every ABI detail of a thread's first
//! activation is decided here.

use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};

use arch::RegisterFile;
use foundation::utils::DownwardStack;
use foundation::ArchContext;

/// Entry point of a lightweight thread. The return value becomes its exit code.
pub type LwpFn = extern "C" fn(*mut c_void) -> i32;

/// Exit code of a `spawn`ed closure that panicked.
pub const PANIC_EXIT_CODE: i32 = 101;

type BoxedEntry = Box<dyn FnOnce() -> i32 + 'static>;

/// Every new thread starts here, with `entry` and `arg` in the first two
/// argument registers. Never called directly and never returns.
pub(crate) extern "C" fn trampoline(entry: LwpFn, arg: *mut c_void) -> ! {
    let code = entry(arg);
    crate::ops::exit(code)
}

/// Program `regs` so its first load resumes in `trampoline(entry, arg)`.
///
/// # Safety
/// `stack_top` must be the upper end of a writable region with at least
/// `FRAME_ALIGN + 2 * size_of::<usize>()` bytes below it.
pub(crate) unsafe fn build_initial_frame(
    regs: &mut RegisterFile,
    stack_top: usize,
    entry: LwpFn,
    arg: *mut c_void,
) {
    let resume = trampoline as *const () as usize;
    let mut stack = DownwardStack::<usize>::new(stack_top);
    for word in RegisterFile::initial_frame(resume) {
        unsafe { stack.push(word) };
    }
    regs.set_sp(stack.sp());
    regs.set_frame_pointer(RegisterFile::initial_frame_pointer(stack.sp()));
    regs.set_args(entry as usize, arg as usize);
    regs.set_resume_address(resume);
    regs.reset_fpu();
}

pub(crate) fn box_entry<F>(f: F) -> *mut c_void
where
    F: FnOnce() -> i32 + 'static,
{
    let entry: BoxedEntry = Box::new(f);
    Box::into_raw(Box::new(entry)).cast()
}

/// Reclaims a closure that never got to run.
///
/// # Safety
/// `arg` must come from `box_entry` and not have been passed to `run_boxed`.
pub(crate) unsafe fn drop_entry(arg: *mut c_void) {
    drop(unsafe { Box::from_raw(arg.cast::<BoxedEntry>()) });
}

/// `LwpFn` adapter for closures created through `box_entry`.
pub(crate) extern "C" fn run_boxed(arg: *mut c_void) -> i32 {
    let entry = unsafe { Box::from_raw(arg.cast::<BoxedEntry>()) };
    match panic::catch_unwind(AssertUnwindSafe(entry)) {
        Ok(code) => code,
        Err(_) => {
            log::error!("[lwp] thread body panicked");
            PANIC_EXIT_CODE
        }
    }
}
