//! Execution trace.
//!
//! Records the registers and stack after every executed instruction and
//! renders them as a table, one row per instruction:
//!
//! ```text
//!                     PC   BP   SP   stack
//! initial values       0    0    2   0 0 0
//!    0  JMP 0 3        3    0    2   0 0 0
//!    3  INC 0 2        4    0    4   0 0 0 0 0
//!    4  CAL 0 1        1    5    7   0 0 0 0 0 | 0 0 5
//! ```
//!
//! A `|` precedes the first cell of every activation record above the
//! global frame. An instruction that faults still gets a row, with the
//! error appended.

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::{Instruction, Word};
use crate::virtual_machine::vm::registers::Registers;
use std::fmt;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TraceRow {
    /// Index the instruction was fetched from.
    pub index: usize,
    pub instruction: Instruction,
    /// Registers after execution.
    pub registers: Registers,
    /// Stack contents after execution.
    pub stack: Vec<Word>,
    /// Bases of the live activation records, innermost first.
    pub frames: Vec<usize>,
    /// Set when the instruction faulted.
    pub fault: Option<VMError>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Trace {
    initial: Registers,
    initial_stack: Vec<Word>,
    rows: Vec<TraceRow>,
}

impl Trace {
    pub fn new(initial: Registers, stack: &[Word]) -> Self {
        Self {
            initial,
            initial_stack: stack.to_vec(),
            rows: Vec::new(),
        }
    }

    pub fn record(
        &mut self,
        index: usize,
        instruction: Instruction,
        registers: Registers,
        stack: &[Word],
        fault: Option<VMError>,
    ) {
        self.rows.push(TraceRow {
            index,
            instruction,
            registers,
            stack: stack.to_vec(),
            frames: frame_bases(stack, registers.base),
            fault,
        });
    }

    pub fn rows(&self) -> &[TraceRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Follows dynamic links down from `base` to the global frame.
///
/// Links are strictly decreasing on a well-formed stack; the walk stops at
/// the first link that is not.
pub fn frame_bases(stack: &[Word], base: usize) -> Vec<usize> {
    let mut frames = vec![base];
    let mut current = base;
    while current > 0 {
        let next = match stack.get(current).map(|&link| usize::try_from(link)) {
            Some(Ok(next)) if next < current => next,
            _ => break,
        };
        frames.push(next);
        current = next;
    }
    frames
}

fn write_stack(f: &mut fmt::Formatter<'_>, stack: &[Word], frames: &[usize]) -> fmt::Result {
    for (address, value) in stack.iter().enumerate() {
        if address > 0 {
            f.write_str(" ")?;
            if frames.contains(&address) {
                f.write_str("| ")?;
            }
        }
        write!(f, "{value}")?;
    }
    Ok(())
}

fn write_registers(f: &mut fmt::Formatter<'_>, registers: &Registers) -> fmt::Result {
    write!(
        f,
        "{:>4} {:>4} {:>4}   ",
        registers.pc, registers.base, registers.sp
    )
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<18}{:>4} {:>4} {:>4}   stack", "", "PC", "BP", "SP")?;
        write!(f, "{:<18}", "initial values")?;
        write_registers(f, &self.initial)?;
        write_stack(f, &self.initial_stack, &[self.initial.base])?;
        for row in &self.rows {
            writeln!(f)?;
            let instruction = row.instruction.to_string();
            write!(f, "{:>4}  {instruction:<12}", row.index)?;
            write_registers(f, &row.registers)?;
            write_stack(f, &row.stack, &row.frames)?;
            if let Some(fault) = &row.fault {
                write!(f, "   fault: {fault}")?;
            }
        }
        Ok(())
    }
}
