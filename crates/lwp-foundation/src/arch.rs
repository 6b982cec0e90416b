/// Architecture register file as seen by the thread runtime. The layout is
/// private to the arch crate; the runtime only goes through these accessors.
pub trait ArchContext: Sized {
    fn new() -> Self;

    fn sp(&self) -> usize;
    fn set_sp(&mut self, sp: usize);

    fn set_frame_pointer(&mut self, fp: usize);

    /// First two integer argument registers of the C calling convention.
    fn set_args(&mut self, a0: usize, a1: usize);
    fn arg(&self, idx: usize) -> usize;

    /// Address execution continues at when this context is first loaded.
    /// Architectures that resume through a stack slot leave this a no-op.
    fn set_resume_address(&mut self, _pc: usize) {}

    /// Reset floating point / vector control state to the process baseline.
    fn reset_fpu(&mut self);

    /// The two words written below the aligned stack top, in push order, so
    /// that the first load of this context lands in `resume` with a well formed
    /// frame.
    fn initial_frame(resume: usize) -> [usize; 2];

    /// Frame pointer for the first activation, given the sp left after the
    /// `initial_frame` words are pushed. The default suits frames that are
    /// themselves a terminating frame record.
    fn initial_frame_pointer(sp: usize) -> usize {
        sp
    }
}
