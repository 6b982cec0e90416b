//! Thread stacks: anonymous private mappings sized from the stack rlimit.

use std::io;
use std::ptr::{self, NonNull};

use crate::config::LwpConfig;
use crate::error::{LwpError, Result};

const FALLBACK_PAGE_SIZE: usize = 4096;

pub fn page_size() -> usize {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size <= 0 {
        log::warn!("[lwp] sysconf(_SC_PAGESIZE) failed, assuming {FALLBACK_PAGE_SIZE}");
        FALLBACK_PAGE_SIZE
    } else {
        size as usize
    }
}

/// Soft `RLIMIT_STACK`, or `None` when unlimited, zero, or unavailable.
pub fn stack_rlimit() -> Option<usize> {
    let mut limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    if unsafe { libc::getrlimit(libc::RLIMIT_STACK, &mut limit) } != 0 {
        log::warn!(
            "[lwp] getrlimit(RLIMIT_STACK) failed: {}",
            io::Error::last_os_error()
        );
        return None;
    }
    if limit.rlim_cur == libc::RLIM_INFINITY || limit.rlim_cur == 0 {
        return None;
    }
    usize::try_from(limit.rlim_cur).ok()
}

#[inline]
pub fn round_up_to_page(size: usize, page: usize) -> usize {
    size.div_ceil(page).saturating_mul(page)
}

/// Byte size of the next stack to allocate under `config`.
pub fn stack_size(config: &LwpConfig) -> usize {
    let requested = config
        .stack_size
        .or_else(stack_rlimit)
        .unwrap_or(config.default_stack_size);
    round_up_to_page(requested, page_size())
}

/// An owned stack mapping. Unmapped exactly once, on drop.
#[derive(Debug)]
pub struct Stack {
    base: NonNull<u8>,
    size: usize,
}

impl Stack {
    pub fn allocate(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(LwpError::InvalidStackSize(size));
        }
        let addr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_STACK,
                -1,
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(LwpError::StackAllocation {
                size,
                source: io::Error::last_os_error(),
            });
        }
        let base = NonNull::new(addr.cast::<u8>()).ok_or_else(|| LwpError::StackAllocation {
            size,
            source: io::Error::from(io::ErrorKind::OutOfMemory),
        })?;
        log::trace!("[lwp] mapped stack {:p}+{:#x}", base, size);
        Ok(Self { base, size })
    }

    pub fn base(&self) -> usize {
        self.base.as_ptr() as usize
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// One past the highest usable address.
    pub fn top(&self) -> usize {
        self.base() + self.size
    }

    fn release(&mut self) {
        let rc = unsafe { libc::munmap(self.base.as_ptr().cast(), self.size) };
        if rc != 0 {
            // The address space can no longer be trusted.
            log::error!(
                "[lwp] munmap({:p}, {:#x}) failed: {}",
                self.base,
                self.size,
                io::Error::last_os_error()
            );
            log::logger().flush();
            std::process::abort();
        }
        log::trace!("[lwp] unmapped stack {:p}+{:#x}", self.base, self.size);
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        self.release();
    }
}

/// Whether the page holding `addr` is mapped, by asking `mincore`.
#[cfg(test)]
pub(crate) fn is_mapped(addr: usize) -> bool {
    let page = page_size();
    let mut residency = 0u8;
    let rc = unsafe {
        libc::mincore(
            (addr & !(page - 1)) as *mut libc::c_void,
            1,
            &mut residency,
        )
    };
    if rc == 0 {
        return true;
    }
    assert_eq!(
        io::Error::last_os_error().raw_os_error(),
        Some(libc::ENOMEM)
    );
    false
}
