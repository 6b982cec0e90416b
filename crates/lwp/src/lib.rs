//! Cooperative lightweight threads.
//!
//! Every thread runs on its own mmap'd stack on the calling OS thread and runs
//! until it calls [`yield_now`], [`exit`] or a blocking [`wait`]. Which thread
//! runs next is up to the active [`Scheduler`], round-robin by default.
//!
//! ```no_run
//! lwp::spawn(|| {
//!     for _ in 0..3 {
//!         lwp::yield_now();
//!     }
//!     7
//! })
//! .unwrap();
//! lwp::start();
//! while let Some((tid, status)) = lwp::wait() {
//!     println!("thread {tid} exited with {}", status.exit_code());
//! }
//! ```

pub mod config;
pub mod error;
pub mod stack;
pub mod thread;

mod frame;
mod ops;
mod registry;
mod runtime;

pub use config::{LwpConfig, LwpConfigBuilder, LwpConfigBuilderError, DEFAULT_STACK_SIZE};
pub use error::{LwpError, Result};
pub use foundation::{Scheduler, Tid, NO_THREAD};
pub use frame::{LwpFn, PANIC_EXIT_CODE};
pub use ops::*;
pub use thread::{ThreadInfo, ThreadState, ThreadStatus};

#[cfg(test)]
mod tests;
