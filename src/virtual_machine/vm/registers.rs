use std::fmt;

/// Snapshot of the machine registers.
///
/// `sp` is the index of the top stack cell and is `-1` when the stack is
/// empty, so it is signed while `pc` and `base` are plain indices.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct Registers {
    /// Index of the next instruction to fetch.
    pub pc: usize,
    /// Stack index of the current activation record.
    pub base: usize,
    /// Index of the top stack cell.
    pub sp: isize,
}

impl fmt::Display for Registers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pc={} b={} sp={}", self.pc, self.base, self.sp)
    }
}
