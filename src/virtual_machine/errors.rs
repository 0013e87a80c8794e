use crate::virtual_machine::isa::Word;
use crate::virtual_machine::vm::registers::Registers;
use pl0_vm_derive::Error;
use std::num::ParseIntError;

/// Errors that can occur while decoding or executing a program.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum VMError {
    /// Opcode outside the instruction set.
    #[error("invalid opcode {opcode}")]
    InvalidOpcode { opcode: u8 },
    /// `OPR` or `SIO` selector outside its enumeration.
    #[error("invalid {opcode} sub-operation {selector}")]
    InvalidSubOperation { opcode: &'static str, selector: Word },
    /// Negative level, address or amount.
    #[error("{opcode} has negative {field} operand {value}")]
    InvalidOperand {
        opcode: &'static str,
        field: &'static str,
        value: Word,
    },
    /// Push or reservation beyond the configured stack capacity.
    #[error("stack overflow: capacity of {limit} cells exhausted")]
    StackOverflow { limit: usize },
    /// Pop with no cell above the reserved global frame.
    #[error("stack underflow")]
    StackUnderflow,
    /// Read or write outside `[0, sp]`.
    #[error("address {address} is outside the stack (sp = {sp})")]
    InvalidAddress { address: usize, sp: isize },
    /// Peek deeper than the stack holds.
    #[error("offset {offset} is below the bottom of a stack of depth {depth}")]
    InvalidStackOffset { offset: usize, depth: usize },
    /// A frame header cell that cannot be used as a stack or program address.
    #[error("frame link at {address} holds invalid value {value}")]
    InvalidLink { address: usize, value: Word },
    /// Static-link walk past the global frame.
    #[error("static chain exhausted walking {level} levels from frame at {base}")]
    StaticChainExhausted { level: usize, base: usize },
    /// Fetch or jump outside the program.
    #[error("instruction address {pc} is outside the program of {len} instructions")]
    InvalidProgramCounter { pc: usize, len: usize },
    #[error("division by zero")]
    DivisionByZero,
    #[error("modulo by zero")]
    ModuloByZero,
    /// Result does not fit in a word.
    #[error("integer overflow in {operation}")]
    IntegerOverflow { operation: &'static str },
    /// Failure reported by the I/O adapter.
    #[error("io error: {0}")]
    IoError(String),
    /// Input token that is not an integer.
    #[error("invalid integer input: {0}")]
    InvalidInput(#[from] ParseIntError),
    /// The configured instruction budget ran out.
    #[error("step limit of {limit} instructions exceeded")]
    StepLimitExceeded { limit: u64 },
    /// Malformed configuration value.
    #[error("invalid value {value:?} for {key}")]
    InvalidConfig { key: &'static str, value: String },
}

/// Coarse classification of [`VMError`] for callers that branch on the kind
/// of failure rather than its details.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidOpcode,
    InvalidSubOperation,
    StackOverflow,
    StackUnderflow,
    InvalidAddress,
    ArithmeticError,
    IOError,
    Cancelled,
    Config,
}

impl ErrorKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidOpcode => "invalid opcode",
            ErrorKind::InvalidSubOperation => "invalid sub-operation",
            ErrorKind::StackOverflow => "stack overflow",
            ErrorKind::StackUnderflow => "stack underflow",
            ErrorKind::InvalidAddress => "invalid address",
            ErrorKind::ArithmeticError => "arithmetic error",
            ErrorKind::IOError => "io error",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Config => "configuration error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl VMError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            VMError::InvalidOpcode { .. } => ErrorKind::InvalidOpcode,
            VMError::InvalidSubOperation { .. } => ErrorKind::InvalidSubOperation,
            VMError::StackOverflow { .. } => ErrorKind::StackOverflow,
            VMError::StackUnderflow => ErrorKind::StackUnderflow,
            VMError::InvalidOperand { .. }
            | VMError::InvalidAddress { .. }
            | VMError::InvalidStackOffset { .. }
            | VMError::InvalidLink { .. }
            | VMError::StaticChainExhausted { .. }
            | VMError::InvalidProgramCounter { .. } => ErrorKind::InvalidAddress,
            VMError::DivisionByZero
            | VMError::ModuloByZero
            | VMError::IntegerOverflow { .. } => ErrorKind::ArithmeticError,
            VMError::IoError(_) | VMError::InvalidInput(_) => ErrorKind::IOError,
            VMError::StepLimitExceeded { .. } => ErrorKind::Cancelled,
            VMError::InvalidConfig { .. } => ErrorKind::Config,
        }
    }
}

/// A [`VMError`] raised by a running machine, with the index of the
/// instruction that raised it and the registers at that moment.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{error} at instruction {pc} ({registers})")]
pub struct Fault {
    #[source]
    pub error: VMError,
    pub pc: usize,
    pub registers: Registers,
}

impl Fault {
    pub const fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn messages_render_fields() {
        assert_eq!(
            VMError::InvalidAddress { address: 9, sp: 4 }.to_string(),
            "address 9 is outside the stack (sp = 4)"
        );
        assert_eq!(
            VMError::InvalidSubOperation {
                opcode: "OPR",
                selector: 42
            }
            .to_string(),
            "invalid OPR sub-operation 42"
        );
        assert_eq!(
            VMError::IoError("unexpected end of input".into()).to_string(),
            "io error: unexpected end of input"
        );
    }

    #[test]
    fn kinds_group_arithmetic_failures() {
        assert_eq!(VMError::DivisionByZero.kind(), ErrorKind::ArithmeticError);
        assert_eq!(VMError::ModuloByZero.kind(), ErrorKind::ArithmeticError);
        assert_eq!(
            VMError::IntegerOverflow { operation: "MUL" }.kind(),
            ErrorKind::ArithmeticError
        );
        assert_eq!(
            VMError::StepLimitExceeded { limit: 10 }.kind(),
            ErrorKind::Cancelled
        );
        assert_eq!(
            VMError::StaticChainExhausted { level: 2, base: 0 }.kind(),
            ErrorKind::InvalidAddress
        );
    }

    #[test]
    fn parse_failures_convert_into_input_errors() {
        let parse = "4x".parse::<Word>().unwrap_err();
        let error = VMError::from(parse.clone());
        assert_eq!(error, VMError::InvalidInput(parse.clone()));
        assert_eq!(error.kind(), ErrorKind::IOError);
        assert_eq!(error.to_string(), format!("invalid integer input: {parse}"));
        assert_eq!(error.source().unwrap().to_string(), parse.to_string());
        assert!(VMError::StackUnderflow.source().is_none());
    }

    #[test]
    fn fault_exposes_error_as_source() {
        let fault = Fault {
            error: VMError::StackUnderflow,
            pc: 3,
            registers: Registers {
                pc: 4,
                base: 0,
                sp: 2,
            },
        };
        assert_eq!(fault.kind(), ErrorKind::StackUnderflow);
        assert_eq!(
            fault.to_string(),
            "stack underflow at instruction 3 (pc=4 b=0 sp=2)"
        );
        let source = fault.source().unwrap();
        assert_eq!(source.to_string(), "stack underflow");
    }
}
