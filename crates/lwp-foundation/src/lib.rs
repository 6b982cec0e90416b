//! Shared vocabulary for the LWP crates: thread ids, the scheduling contract, and
//! the architecture context trait the frame builder programs against.

#![no_std]

pub mod arch;
pub mod sched;
pub mod utils;

pub use arch::ArchContext;
pub use sched::{Scheduler, Tid, NO_THREAD};
