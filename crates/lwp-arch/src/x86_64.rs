use core::arch::naked_asm;

use foundation::ArchContext;
use memoffset::offset_of;

/// Legacy x87/SSE state area written by `fxsave64`.
#[repr(C, align(16))]
#[derive(Clone, Copy)]
pub struct FxSave(pub [u8; 512]);

/// FCW = 0x037F (all exceptions masked, extended precision, round to nearest),
/// MXCSR = 0x1F80 (all SSE exceptions masked). Everything else cleared.
pub const FPU_INIT: FxSave = {
    let mut area = [0u8; 512];
    area[0] = 0x7F;
    area[1] = 0x03;
    area[24] = 0x80;
    area[25] = 0x1F;
    FxSave(area)
};

#[repr(C, align(16))]
#[derive(Clone, Copy)]
pub struct RegisterFile {
    pub rax: usize,
    pub rbx: usize,
    pub rcx: usize,
    pub rdx: usize,
    pub rsi: usize,
    pub rdi: usize,
    pub rbp: usize,
    pub rsp: usize,
    pub r8: usize,
    pub r9: usize,
    pub r10: usize,
    pub r11: usize,
    pub r12: usize,
    pub r13: usize,
    pub r14: usize,
    pub r15: usize,
    pub fxsave: FxSave,
}

const _: () = assert!(offset_of!(RegisterFile, fxsave) % 16 == 0);

impl RegisterFile {
    pub const fn zeroed() -> Self {
        Self {
            rax: 0,
            rbx: 0,
            rcx: 0,
            rdx: 0,
            rsi: 0,
            rdi: 0,
            rbp: 0,
            rsp: 0,
            r8: 0,
            r9: 0,
            r10: 0,
            r11: 0,
            r12: 0,
            r13: 0,
            r14: 0,
            r15: 0,
            fxsave: FPU_INIT,
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
        self.rsp
    }

    fn set_sp(&mut self, sp: usize) {
        self.rsp = sp;
    }

    fn set_frame_pointer(&mut self, fp: usize) {
        self.rbp = fp;
    }

    fn set_args(&mut self, a0: usize, a1: usize) {
        self.rdi = a0;
        self.rsi = a1;
    }

    fn arg(&self, idx: usize) -> usize {
        match idx {
            0 => self.rdi,
            1 => self.rsi,
            2 => self.rdx,
            3 => self.rcx,
            4 => self.r8,
            5 => self.r9,
            _ => 0,
        }
    }

    fn reset_fpu(&mut self) {
        self.fxsave = FPU_INIT;
    }

    // `ret` pops the resume address; the zero above it becomes the resumed
    // function's own return address and ends frame walks there.
    fn initial_frame(resume: usize) -> [usize; 2] {
        [0, resume]
    }

    // The resumed prologue pushes rbp over the spent resume slot; a zero rbp
    // makes that saved link the end of the chain.
    fn initial_frame_pointer(_sp: usize) -> usize {
        0
    }
}

/// # Safety
/// `regs` must be valid for writes. Loading the saved buffer later makes this
/// call return a second time, so the calling frame must still be live then.
#[unsafe(naked)]
pub unsafe extern "C" fn save_rfile(regs: *mut RegisterFile) {
    naked_asm!(
        "mov [rdi + {o_rax}], rax",
        "mov [rdi + {o_rbx}], rbx",
        "mov [rdi + {o_rcx}], rcx",
        "mov [rdi + {o_rdx}], rdx",
        "mov [rdi + {o_rsi}], rsi",
        "mov [rdi + {o_rdi}], rdi",
        "mov [rdi + {o_rbp}], rbp",
        "mov [rdi + {o_rsp}], rsp",
        "mov [rdi + {o_r8}], r8",
        "mov [rdi + {o_r9}], r9",
        "mov [rdi + {o_r10}], r10",
        "mov [rdi + {o_r11}], r11",
        "mov [rdi + {o_r12}], r12",
        "mov [rdi + {o_r13}], r13",
        "mov [rdi + {o_r14}], r14",
        "mov [rdi + {o_r15}], r15",
        "fxsave64 [rdi + {fxsave}]",
        "ret",
        o_rax = const offset_of!(RegisterFile, rax),
        o_rbx = const offset_of!(RegisterFile, rbx),
        o_rcx = const offset_of!(RegisterFile, rcx),
        o_rdx = const offset_of!(RegisterFile, rdx),
        o_rsi = const offset_of!(RegisterFile, rsi),
        o_rdi = const offset_of!(RegisterFile, rdi),
        o_rbp = const offset_of!(RegisterFile, rbp),
        o_rsp = const offset_of!(RegisterFile, rsp),
        o_r8 = const offset_of!(RegisterFile, r8),
        o_r9 = const offset_of!(RegisterFile, r9),
        o_r10 = const offset_of!(RegisterFile, r10),
        o_r11 = const offset_of!(RegisterFile, r11),
        o_r12 = const offset_of!(RegisterFile, r12),
        o_r13 = const offset_of!(RegisterFile, r13),
        o_r14 = const offset_of!(RegisterFile, r14),
        o_r15 = const offset_of!(RegisterFile, r15),
        fxsave = const offset_of!(RegisterFile, fxsave),
    )
}

/// # Safety
/// `regs` must hold a state produced by `save_rfile`/`swap_rfiles`, or a fresh
/// frame whose stack is live and correctly aligned.
#[unsafe(naked)]
pub unsafe extern "C" fn load_rfile(regs: *const RegisterFile) -> ! {
    naked_asm!(
        "fxrstor64 [rdi + {fxsave}]",
        "mov rax, [rdi + {o_rax}]",
        "mov rbx, [rdi + {o_rbx}]",
        "mov rcx, [rdi + {o_rcx}]",
        "mov rdx, [rdi + {o_rdx}]",
        "mov rsi, [rdi + {o_rsi}]",
        "mov rbp, [rdi + {o_rbp}]",
        "mov rsp, [rdi + {o_rsp}]",
        "mov r8, [rdi + {o_r8}]",
        "mov r9, [rdi + {o_r9}]",
        "mov r10, [rdi + {o_r10}]",
        "mov r11, [rdi + {o_r11}]",
        "mov r12, [rdi + {o_r12}]",
        "mov r13, [rdi + {o_r13}]",
        "mov r14, [rdi + {o_r14}]",
        "mov r15, [rdi + {o_r15}]",
        // base register goes last
        "mov rdi, [rdi + {o_rdi}]",
        "ret",
        o_rax = const offset_of!(RegisterFile, rax),
        o_rbx = const offset_of!(RegisterFile, rbx),
        o_rcx = const offset_of!(RegisterFile, rcx),
        o_rdx = const offset_of!(RegisterFile, rdx),
        o_rsi = const offset_of!(RegisterFile, rsi),
        o_rdi = const offset_of!(RegisterFile, rdi),
        o_rbp = const offset_of!(RegisterFile, rbp),
        o_rsp = const offset_of!(RegisterFile, rsp),
        o_r8 = const offset_of!(RegisterFile, r8),
        o_r9 = const offset_of!(RegisterFile, r9),
        o_r10 = const offset_of!(RegisterFile, r10),
        o_r11 = const offset_of!(RegisterFile, r11),
        o_r12 = const offset_of!(RegisterFile, r12),
        o_r13 = const offset_of!(RegisterFile, r13),
        o_r14 = const offset_of!(RegisterFile, r14),
        o_r15 = const offset_of!(RegisterFile, r15),
        fxsave = const offset_of!(RegisterFile, fxsave),
    )
}

/// # Safety
/// `old` must be valid for writes, `new` must satisfy the contract of
/// `load_rfile`. They may be the same buffer.
#[unsafe(naked)]
pub unsafe extern "C" fn swap_rfiles(old: *mut RegisterFile, new: *const RegisterFile) {
    naked_asm!(
        "mov [rdi + {o_rax}], rax",
        "mov [rdi + {o_rbx}], rbx",
        "mov [rdi + {o_rcx}], rcx",
        "mov [rdi + {o_rdx}], rdx",
        "mov [rdi + {o_rsi}], rsi",
        "mov [rdi + {o_rdi}], rdi",
        "mov [rdi + {o_rbp}], rbp",
        "mov [rdi + {o_rsp}], rsp",
        "mov [rdi + {o_r8}], r8",
        "mov [rdi + {o_r9}], r9",
        "mov [rdi + {o_r10}], r10",
        "mov [rdi + {o_r11}], r11",
        "mov [rdi + {o_r12}], r12",
        "mov [rdi + {o_r13}], r13",
        "mov [rdi + {o_r14}], r14",
        "mov [rdi + {o_r15}], r15",
        "fxsave64 [rdi + {fxsave}]",
        "mov rdi, rsi",
        "jmp {load}",
        o_rax = const offset_of!(RegisterFile, rax),
        o_rbx = const offset_of!(RegisterFile, rbx),
        o_rcx = const offset_of!(RegisterFile, rcx),
        o_rdx = const offset_of!(RegisterFile, rdx),
        o_rsi = const offset_of!(RegisterFile, rsi),
        o_rdi = const offset_of!(RegisterFile, rdi),
        o_rbp = const offset_of!(RegisterFile, rbp),
        o_rsp = const offset_of!(RegisterFile, rsp),
        o_r8 = const offset_of!(RegisterFile, r8),
        o_r9 = const offset_of!(RegisterFile, r9),
        o_r10 = const offset_of!(RegisterFile, r10),
        o_r11 = const offset_of!(RegisterFile, r11),
        o_r12 = const offset_of!(RegisterFile, r12),
        o_r13 = const offset_of!(RegisterFile, r13),
        o_r14 = const offset_of!(RegisterFile, r14),
        o_r15 = const offset_of!(RegisterFile, r15),
        fxsave = const offset_of!(RegisterFile, fxsave),
        load = sym load_rfile,
    )
}
