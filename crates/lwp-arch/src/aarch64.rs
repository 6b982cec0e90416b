use core::arch::naked_asm;

use foundation::ArchContext;
use memoffset::offset_of;

/// Round to nearest, no traps, no flush-to-zero.
pub const FPCR_INIT: usize = 0;

#[repr(C, align(16))]
#[derive(Clone, Copy)]
pub struct RegisterFile {
    /// x0-x28, fp (x29), lr (x30)
    pub x: [usize; 31],
    pub sp: usize,
    pub fpcr: usize,
    /// d8-d15, the callee saved low halves of v8-v15
    pub d: [u64; 8],
}

// The assembly below hardcodes these offsets.
const _: () = {
    assert!(offset_of!(RegisterFile, x) == 0);
    assert!(offset_of!(RegisterFile, sp) == 248);
    assert!(offset_of!(RegisterFile, fpcr) == 256);
    assert!(offset_of!(RegisterFile, d) == 264);
};

impl RegisterFile {
    pub const fn zeroed() -> Self {
        Self {
            x: [0; 31],
            sp: 0,
            fpcr: FPCR_INIT,
            d: [0; 8],
        }
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl ArchContext for RegisterFile {
    fn new() -> Self {
        Self::zeroed()
    }

    fn sp(&self) -> usize {
        self.sp
    }

    fn set_sp(&mut self, sp: usize) {
        self.sp = sp;
    }

    fn set_frame_pointer(&mut self, fp: usize) {
        self.x[29] = fp;
    }

    fn set_args(&mut self, a0: usize, a1: usize) {
        self.x[0] = a0;
        self.x[1] = a1;
    }

    fn arg(&self, idx: usize) -> usize {
        if idx < 8 {
            self.x[idx]
        } else {
            0
        }
    }

    fn set_resume_address(&mut self, pc: usize) {
        self.x[30] = pc;
    }

    fn reset_fpu(&mut self) {
        self.fpcr = FPCR_INIT;
    }

    // A frame record {fp = 0, lr = resume}: lr is pushed first so it lands
    // above fp.
    fn initial_frame(resume: usize) -> [usize; 2] {
        [resume, 0]
    }
}

/// # Safety
/// `regs` must be valid for writes. Loading the saved buffer later makes this
/// call return a second time, so the calling frame must still be live then.
#[unsafe(naked)]
pub unsafe extern "C" fn save_rfile(regs: *mut RegisterFile) {
    naked_asm!(
        "stp x0, x1, [x0, #0]",
        "stp x2, x3, [x0, #16]",
        "stp x4, x5, [x0, #32]",
        "stp x6, x7, [x0, #48]",
        "stp x8, x9, [x0, #64]",
        "stp x10, x11, [x0, #80]",
        "stp x12, x13, [x0, #96]",
        "stp x14, x15, [x0, #112]",
        "stp x16, x17, [x0, #128]",
        "stp x18, x19, [x0, #144]",
        "stp x20, x21, [x0, #160]",
        "stp x22, x23, [x0, #176]",
        "stp x24, x25, [x0, #192]",
        "stp x26, x27, [x0, #208]",
        "stp x28, x29, [x0, #224]",
        "mov x9, sp",
        "stp x30, x9, [x0, #240]",
        "mrs x9, fpcr",
        "str x9, [x0, #256]",
        "stp d8, d9, [x0, #264]",
        "stp d10, d11, [x0, #280]",
        "stp d12, d13, [x0, #296]",
        "stp d14, d15, [x0, #312]",
        "ret",
    )
}

/// # Safety
/// `regs` must hold a state produced by `save_rfile`/`swap_rfiles`, or a fresh
/// frame whose stack is live and correctly aligned.
#[unsafe(naked)]
pub unsafe extern "C" fn load_rfile(regs: *const RegisterFile) -> ! {
    naked_asm!(
        "ldp d8, d9, [x0, #264]",
        "ldp d10, d11, [x0, #280]",
        "ldp d12, d13, [x0, #296]",
        "ldp d14, d15, [x0, #312]",
        "ldr x9, [x0, #256]",
        "msr fpcr, x9",
        "ldp x30, x9, [x0, #240]",
        "mov sp, x9",
        "ldp x2, x3, [x0, #16]",
        "ldp x4, x5, [x0, #32]",
        "ldp x6, x7, [x0, #48]",
        "ldp x8, x9, [x0, #64]",
        "ldp x10, x11, [x0, #80]",
        "ldp x12, x13, [x0, #96]",
        "ldp x14, x15, [x0, #112]",
        "ldp x16, x17, [x0, #128]",
        "ldp x18, x19, [x0, #144]",
        "ldp x20, x21, [x0, #160]",
        "ldp x22, x23, [x0, #176]",
        "ldp x24, x25, [x0, #192]",
        "ldp x26, x27, [x0, #208]",
        "ldp x28, x29, [x0, #224]",
        // base register goes last
        "ldr x1, [x0, #8]",
        "ldr x0, [x0, #0]",
        "ret",
    )
}

/// # Safety
/// `old` must be valid for writes, `new` must satisfy the contract of
/// `load_rfile`. They may be the same buffer.
#[unsafe(naked)]
pub unsafe extern "C" fn swap_rfiles(old: *mut RegisterFile, new: *const RegisterFile) {
    naked_asm!(
        "stp x0, x1, [x0, #0]",
        "stp x2, x3, [x0, #16]",
        "stp x4, x5, [x0, #32]",
        "stp x6, x7, [x0, #48]",
        "stp x8, x9, [x0, #64]",
        "stp x10, x11, [x0, #80]",
        "stp x12, x13, [x0, #96]",
        "stp x14, x15, [x0, #112]",
        "stp x16, x17, [x0, #128]",
        "stp x18, x19, [x0, #144]",
        "stp x20, x21, [x0, #160]",
        "stp x22, x23, [x0, #176]",
        "stp x24, x25, [x0, #192]",
        "stp x26, x27, [x0, #208]",
        "stp x28, x29, [x0, #224]",
        "mov x9, sp",
        "stp x30, x9, [x0, #240]",
        "mrs x9, fpcr",
        "str x9, [x0, #256]",
        "stp d8, d9, [x0, #264]",
        "stp d10, d11, [x0, #280]",
        "stp d12, d13, [x0, #296]",
        "stp d14, d15, [x0, #312]",
        "mov x0, x1",
        "b {load}",
        load = sym load_rfile,
    )
}
