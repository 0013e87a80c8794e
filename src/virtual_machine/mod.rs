//! Stack-based virtual machine for the PL/0 instruction set.
//!
//! The VM executes instruction sequences produced by a PL/0 compiler. It has
//! no heap and no dynamic typing: every value is a signed integer [`isa::Word`]
//! living on a single execution stack.
//!
//! # Architecture
//!
//! - **Instruction format**: fixed-width `op level address` triples, decoded
//!   into a tagged [`isa::Instruction`] at fetch time
//! - **Registers**: program counter `pc`, frame base `b` and stack pointer `sp`
//! - **Activation records**: dynamic link, static link and return address,
//!   followed by locals; `level` operands walk the static chain
//! - **I/O**: `SIO` instructions go through a host-supplied [`io::Io`] adapter
//! - **Limits**: bounded stack and an optional instruction budget
//!
//! # Example
//!
//! ```
//! use pl0_vm::virtual_machine::io::BufferedIo;
//! use pl0_vm::virtual_machine::isa::{Instruction, OprType, SioType};
//! use pl0_vm::virtual_machine::program::Program;
//! use pl0_vm::virtual_machine::vm::VM;
//!
//! let program = Program::from_instructions([
//!     Instruction::Lit(5),
//!     Instruction::Lit(3),
//!     Instruction::Opr(OprType::Plus),
//!     Instruction::Sio(SioType::Write),
//!     Instruction::Sio(SioType::Halt),
//! ]);
//! let mut io = BufferedIo::new();
//! VM::new(program).run(&mut io).unwrap();
//! assert_eq!(io.output(), &[8]);
//! ```
//!
//! # Modules
//!
//! - [`config`]: Stack size, tracing and step limit
//! - [`errors`]: Execution error types and fault reports
//! - [`io`]: Host I/O trait and adapters
//! - [`isa`]: Instruction set definition and decoder
//! - [`program`]: Instruction memory
//! - [`vm`]: Interpreter core, execution stack, profile and trace

pub mod config;
pub mod errors;
pub mod io;
pub mod isa;
#[cfg(test)]
mod isa_static_check;
pub mod program;
pub mod vm;
