//! Bounded execution stack.
//!
//! Holds every activation record and every temporary. Cells are addressed by
//! absolute index from the bottom; `sp` is the index of the top cell and is
//! `-1` when the stack is empty. Every access is bounds-checked against
//! `[0, sp]`, and growth never leaves an uninitialised gap.
//!
//! A stack may reserve cells at the bottom. Reserved cells can be read and
//! written but never popped or truncated away.

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::Word;

#[derive(Clone, Debug)]
pub struct Stack {
    cells: Vec<Word>,
    max_size: usize,
    /// Cells below this index are reserved.
    floor: usize,
}

impl Stack {
    /// Creates an empty stack that holds at most `max_size` cells.
    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            cells: Vec::new(),
            max_size,
            floor: 0,
        }
    }

    /// Creates a stack whose first `reserved` cells are zeroed and pinned.
    ///
    /// The capacity is raised to `reserved` if it is smaller, so the reserved
    /// cells always fit.
    pub fn with_reserved(max_size: usize, reserved: usize) -> Self {
        let mut stack = Self::with_max_size(max_size.max(reserved));
        stack.cells.resize(reserved, 0);
        stack.floor = reserved;
        stack
    }

    /// Index of the top cell, `-1` when empty.
    pub fn sp(&self) -> isize {
        self.cells.len() as isize - 1
    }

    pub fn depth(&self) -> usize {
        self.cells.len()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Fails with [`VMError::StackOverflow`] unless `count` more cells fit.
    pub fn ensure_room(&self, count: usize) -> Result<(), VMError> {
        match self.cells.len().checked_add(count) {
            Some(len) if len <= self.max_size => Ok(()),
            _ => Err(VMError::StackOverflow {
                limit: self.max_size,
            }),
        }
    }

    pub fn push(&mut self, value: Word) -> Result<(), VMError> {
        self.ensure_room(1)?;
        self.cells.push(value);
        Ok(())
    }

    /// Fails with [`VMError::StackUnderflow`] when only reserved cells remain.
    pub fn pop(&mut self) -> Result<Word, VMError> {
        if self.cells.len() <= self.floor {
            return Err(VMError::StackUnderflow);
        }
        self.cells.pop().ok_or(VMError::StackUnderflow)
    }

    /// Returns the cell `offset` positions below the top (0 = top).
    pub fn peek(&self, offset: usize) -> Result<Word, VMError> {
        let depth = self.cells.len();
        if offset >= depth {
            return Err(VMError::InvalidStackOffset { offset, depth });
        }
        Ok(self.cells[depth - 1 - offset])
    }

    /// Reads the cell at an absolute address.
    pub fn read(&self, address: usize) -> Result<Word, VMError> {
        self.cells
            .get(address)
            .copied()
            .ok_or(VMError::InvalidAddress {
                address,
                sp: self.sp(),
            })
    }

    /// Overwrites the cell at an absolute address.
    pub fn write(&mut self, address: usize, value: Word) -> Result<(), VMError> {
        let sp = self.sp();
        let cell = self
            .cells
            .get_mut(address)
            .ok_or(VMError::InvalidAddress { address, sp })?;
        *cell = value;
        Ok(())
    }

    /// Pushes `amount` zeroed cells.
    pub fn grow(&mut self, amount: usize) -> Result<(), VMError> {
        self.ensure_room(amount)?;
        self.cells.resize(self.cells.len() + amount, 0);
        Ok(())
    }

    /// Drops every cell at or above `len`, keeping the reserved cells.
    pub fn truncate(&mut self, len: usize) {
        self.cells.truncate(len.max(self.floor));
    }

    /// All cells, bottom to top.
    pub fn as_slice(&self) -> &[Word] {
        &self.cells
    }
}
