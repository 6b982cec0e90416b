//! Control transfer between lightweight threads.
//!
//! Each architecture module provides a `RegisterFile` holding every general
//! purpose register plus floating point control state, and three primitives:
//!
//! - `save_rfile` stores the live registers into a buffer and returns.
//! - `load_rfile` installs a buffer and continues wherever it says. Never returns.
//! - `swap_rfiles` does both in one step. The caller next observes control when
//!   some later transfer loads the buffer it saved into.
//!
//! The primitives know nothing about calling conventions. Whoever builds a
//! fresh register file (see `ArchContext::initial_frame`) is responsible for a
//! correctly aligned frame to resume into.

#![no_std]

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        mod x86_64;
        pub use crate::x86_64::*;
    } else if #[cfg(target_arch = "aarch64")] {
        mod aarch64;
        pub use crate::aarch64::*;
    } else {
        compile_error!("lwp-arch supports x86_64 and aarch64 only");
    }
}
