use core::marker::PhantomData;
use core::mem;
use core::ptr;

cfg_if::cfg_if! {
    if #[cfg(any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "x86"))] {
        /// Call frame alignment required by the C ABI.
        pub const FRAME_ALIGN: usize = 16;
    } else if #[cfg(target_arch = "arm")] {
        pub const FRAME_ALIGN: usize = 8;
    } else {
        pub const FRAME_ALIGN: usize = 2 * mem::size_of::<usize>();
    }
}

/// Writes the first words of a fresh thread's stack, growing down from its top.
pub struct DownwardStack<T> {
    sp: usize,
    _marker: PhantomData<T>,
}

impl<T> DownwardStack<T> {
    /// Starts at `top` rounded down to `FRAME_ALIGN`.
    pub fn new(top: usize) -> Self {
        let align = mem::align_of::<T>().max(FRAME_ALIGN);
        Self {
            sp: top & !(align - 1),
            _marker: PhantomData,
        }
    }

    /// # Safety
    /// The `size_of::<T>()` bytes just below the current sp must be writable.
    pub unsafe fn push(&mut self, value: T) {
        self.sp -= mem::size_of::<T>();
        unsafe { ptr::write(self.sp as *mut T, value) };
    }

    /// Lowest written address, which becomes the thread's initial sp.
    pub fn sp(&self) -> usize {
        self.sp
    }
}
