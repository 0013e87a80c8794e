use crate::virtual_machine::isa::OpCode;
use std::fmt;

/// One slot per opcode value, indexed by discriminant.
const OPCODE_SLOTS: usize = 13;

/// Executed-instruction counts per opcode.
///
/// Backed by a flat array indexed by the [`OpCode`] discriminant so counting
/// stays branch-free in the fetch loop.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExecutionProfile {
    counts: [u64; OPCODE_SLOTS],
}

impl Default for ExecutionProfile {
    fn default() -> Self {
        Self {
            counts: [0; OPCODE_SLOTS],
        }
    }
}

impl ExecutionProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one execution of `op`.
    #[inline(always)]
    pub fn record(&mut self, op: OpCode) {
        let slot = &mut self.counts[op as usize];
        *slot = slot.saturating_add(1);
    }

    pub fn count(&self, op: OpCode) -> u64 {
        self.counts[op as usize]
    }

    /// Total executed instructions.
    pub fn total(&self) -> u64 {
        self.counts
            .iter()
            .fold(0u64, |acc, &v| acc.saturating_add(v))
    }

    /// Returns every opcode with its count, in encoding order.
    pub fn iter(&self) -> impl Iterator<Item = (OpCode, u64)> + '_ {
        OpCode::ALL.iter().map(|&op| (op, self.count(op)))
    }
}

impl fmt::Display for ExecutionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (op, count) in self.iter().filter(|(_, count)| *count > 0) {
            writeln!(f, "{op:<4}{count:>10}")?;
        }
        write!(f, "{:<4}{:>10}", "all", self.total())
    }
}
