//! Instruction memory.
//!
//! A [`Program`] is the ordered, read-only instruction sequence a machine
//! executes, indexed by a zero-based program counter. Instructions are kept
//! in raw form and decoded at fetch time, so a program built by an external
//! compiler may contain invalid instructions that only fault if reached.

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::{Instruction, RawInstruction};
use std::fmt;

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Program {
    code: Vec<RawInstruction>,
}

impl Program {
    pub fn new(code: Vec<RawInstruction>) -> Self {
        Self { code }
    }

    /// Builds a program from decoded instructions.
    pub fn from_instructions<I: IntoIterator<Item = Instruction>>(instructions: I) -> Self {
        instructions.into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn get(&self, pc: usize) -> Option<RawInstruction> {
        self.code.get(pc).copied()
    }

    /// Returns the instruction at `pc`, or [`VMError::InvalidProgramCounter`]
    /// when `pc` is past the end.
    pub fn fetch(&self, pc: usize) -> Result<RawInstruction, VMError> {
        self.get(pc).ok_or(VMError::InvalidProgramCounter {
            pc,
            len: self.code.len(),
        })
    }

    /// Fails unless `target` indexes an instruction.
    pub fn check_target(&self, target: usize) -> Result<(), VMError> {
        self.fetch(target).map(|_| ())
    }

    pub fn as_slice(&self) -> &[RawInstruction] {
        &self.code
    }
}

impl From<Vec<RawInstruction>> for Program {
    fn from(code: Vec<RawInstruction>) -> Self {
        Self::new(code)
    }
}

impl FromIterator<Instruction> for Program {
    fn from_iter<I: IntoIterator<Item = Instruction>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(RawInstruction::from).collect())
    }
}

impl fmt::Display for Program {
    /// One instruction per line, prefixed with its index.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, raw) in self.code.iter().enumerate() {
            match Instruction::decode(*raw) {
                Ok(instruction) => writeln!(f, "{index:>4}  {instruction}")?,
                Err(_) => writeln!(f, "{index:>4}  {raw}")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::virtual_machine::isa::{OpCode, SioType};

    #[test]
    fn from_instructions_encodes_raw() {
        let program = Program::from_instructions([
            Instruction::Lit(5),
            Instruction::Sio(SioType::Halt),
        ]);
        assert_eq!(program.len(), 2);
        assert_eq!(
            program.get(0),
            Some(RawInstruction::new(OpCode::Lit as u8, 0, 5))
        );
        assert_eq!(
            program.get(1),
            Some(RawInstruction::new(OpCode::Sio as u8, 0, 3))
        );
    }

    #[test]
    fn fetch_past_end_is_invalid_pc() {
        let program = Program::from_instructions([Instruction::Lit(1)]);
        assert!(program.fetch(0).is_ok());
        assert_eq!(
            program.fetch(1),
            Err(VMError::InvalidProgramCounter { pc: 1, len: 1 })
        );
        assert!(program.check_target(1).is_err());
        assert!(Program::default().is_empty());
    }

    #[test]
    fn display_lists_instructions() {
        let program = Program::new(vec![
            RawInstruction::new(1, 0, 5),
            RawInstruction::new(2, 0, 99),
        ]);
        assert_eq!(program.to_string(), "   0  LIT 0 5\n   1  OPR 0 99\n");
    }
}
