//! PL/0 virtual machine library.
//!
//! Provides the instruction set, the stack-based interpreter that executes it,
//! and the logging used throughout the crate.

pub mod utils;
pub mod virtual_machine;
