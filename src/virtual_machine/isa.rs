//! Instruction Set Architecture (ISA) definitions.
//!
//! Defines the machine's instruction set. The [`for_each_opcode!`](crate::for_each_opcode),
//! [`for_each_opr_type!`](crate::for_each_opr_type) and
//! [`for_each_sio_type!`](crate::for_each_sio_type) macros hold the canonical
//! definitions and invoke a callback macro for code generation, so the enums,
//! their decoders and the ISA fingerprint check all read from one list.
//!
//! This module generates:
//! - [`OpCode`], [`OprType`] and [`SioType`] with their numeric encodings
//! - `TryFrom<u8>` for opcodes and `from_selector` for sub-operations
//!
//! # Instruction Format
//!
//! Every instruction is a fixed-width triple `op level address`
//! ([`RawInstruction`]). For `OPR` and `SIO` the `address` field selects a
//! sub-operation instead of naming a stack slot. [`Instruction`] is the decoded
//! form: a tagged variant per opcode, so an invalid `(op, selector)` pair
//! cannot exist once decoding has succeeded.

use crate::virtual_machine::errors::VMError;
use std::fmt;

/// A stack cell and the type of every integer operand.
pub type Word = i64;

/// Invokes a callback macro with the complete opcode list.
///
/// Value 7 is unassigned: it belonged to a `DEC` instruction that is not part
/// of this instruction set and decodes as an invalid opcode.
#[macro_export]
macro_rules! for_each_opcode {
    ($callback:ident) => {
        $callback! {
            /// LIT 0, value ; push value
            Lit = 1, "LIT",
            /// OPR 0, sub ; return or arithmetic/logic operation selected by sub
            Opr = 2, "OPR",
            /// LOD level, address ; push the cell at base(level) + address
            Lod = 3, "LOD",
            /// STO level, address ; pop into the cell at base(level) + address
            Sto = 4, "STO",
            /// CAL level, address ; push an activation record and jump to address
            Cal = 5, "CAL",
            /// INC 0, amount ; reserve amount cells on top of the stack
            Inc = 6, "INC",
            /// JMP 0, address ; pc = address
            Jmp = 8, "JMP",
            /// JPC 0, address ; pop x, jump to address when x == 0
            Jpc = 9, "JPC",
            /// SIO 0, sub ; write, read or halt selected by sub
            Sio = 10, "SIO",
            /// LDA 0, address ; push the cell at the absolute address
            Lda = 11, "LDA",
            /// STA 0, address ; pop into the cell at the absolute address
            Sta = 12, "STA",
        }
    };
}

/// Invokes a callback macro with the `OPR` sub-operation list.
#[macro_export]
macro_rules! for_each_opr_type {
    ($callback:ident) => {
        $callback! {
            /// Tear down the current activation record
            Ret = 0, "RET",
            /// x = -x
            InvertValue = 1, "INVERT_VALUE",
            /// x + y
            Plus = 2, "PLUS",
            /// x - y
            Minus = 3, "MINUS",
            /// x * y
            Mul = 4, "MUL",
            /// x / y, truncating toward zero
            Div = 5, "DIV",
            /// x is odd
            Odd = 6, "ODD",
            /// x % y, sign follows x
            Mod = 7, "MOD",
            /// x == y
            Eq = 8, "EQ",
            /// x != y
            Neq = 9, "NEQ",
            /// x < y
            Less = 10, "LESS",
            /// x <= y
            LessEq = 11, "LESS_EQ",
            /// x > y
            Grt = 12, "GRT",
            /// x >= y
            GrtEq = 13, "GRT_EQ",
        }
    };
}

/// Invokes a callback macro with the `SIO` sub-operation list.
#[macro_export]
macro_rules! for_each_sio_type {
    ($callback:ident) => {
        $callback! {
            /// Pop a value and emit it through the I/O adapter
            Write = 1, "WRITE",
            /// Read a value through the I/O adapter and push it
            Read = 2, "READ",
            /// Stop the machine
            Halt = 3, "HALT",
        }
    };
}

#[macro_export]
macro_rules! define_opcodes {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $opcode:literal, $mnemonic:literal
        ),* $(,)?
    ) => {
        /// Primary operation code of an instruction.
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        #[repr(u8)]
        pub enum OpCode {
            $(
                $(#[$doc])*
                $name = $opcode,
            )*
        }

        impl TryFrom<u8> for OpCode {
            type Error = VMError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $( $opcode => Ok(OpCode::$name), )*
                    _ => Err(VMError::InvalidOpcode { opcode: value }),
                }
            }
        }

        impl OpCode {
            /// Every opcode in encoding order.
            pub const ALL: &'static [OpCode] = &[$( OpCode::$name ),*];

            /// Returns the assembly mnemonic for this opcode.
            pub const fn mnemonic(&self) -> &'static str {
                match self {
                    $( OpCode::$name => $mnemonic, )*
                }
            }
        }
    };
}

#[macro_export]
macro_rules! define_selector {
    (
        $(#[$type_doc:meta])*
        $ty:ident for $parent:literal;
        $(
            $(#[$doc:meta])*
            $name:ident = $value:literal, $mnemonic:literal
        ),* $(,)?
    ) => {
        $(#[$type_doc])*
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        pub enum $ty {
            $(
                $(#[$doc])*
                $name,
            )*
        }

        impl $ty {
            /// Every sub-operation in encoding order.
            pub const ALL: &'static [$ty] = &[$( $ty::$name ),*];

            /// Decodes the `address` field of a
            #[doc = $parent]
            /// instruction.
            pub fn from_selector(value: Word) -> Result<Self, VMError> {
                match value {
                    $( $value => Ok($ty::$name), )*
                    _ => Err(VMError::InvalidSubOperation {
                        opcode: $parent,
                        selector: value,
                    }),
                }
            }

            /// Returns the numeric selector stored in the `address` field.
            pub const fn selector(&self) -> Word {
                match self {
                    $( $ty::$name => $value, )*
                }
            }

            /// Returns the mnemonic for this sub-operation.
            pub const fn mnemonic(&self) -> &'static str {
                match self {
                    $( $ty::$name => $mnemonic, )*
                }
            }
        }
    };
}

macro_rules! define_opr_types {
    ($($list:tt)*) => {
        define_selector! {
            /// Sub-operation of an `OPR` instruction.
            OprType for "OPR";
            $($list)*
        }
    };
}

macro_rules! define_sio_types {
    ($($list:tt)*) => {
        define_selector! {
            /// Sub-operation of an `SIO` instruction.
            SioType for "SIO";
            $($list)*
        }
    };
}

for_each_opcode!(define_opcodes);
for_each_opr_type!(define_opr_types);
for_each_sio_type!(define_sio_types);

/// Converts a numeric opcode into its mnemonic, or `"unknown"` when the value
/// is outside the instruction set.
pub fn op_code_to_str(op: u8) -> &'static str {
    OpCode::try_from(op).map_or("unknown", |op| op.mnemonic())
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.mnemonic())
    }
}

impl fmt::Display for OprType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.mnemonic())
    }
}

impl fmt::Display for SioType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.mnemonic())
    }
}

/// Undecoded instruction as produced by an assembler or compiler.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct RawInstruction {
    /// Numeric opcode.
    pub op: u8,
    /// Static nesting distance, ignored by most opcodes.
    pub level: Word,
    /// Address, literal, amount or sub-operation selector depending on `op`.
    pub address: Word,
}

impl RawInstruction {
    pub const fn new(op: u8, level: Word, address: Word) -> Self {
        Self { op, level, address }
    }
}

impl fmt::Display for RawInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", op_code_to_str(self.op), self.level, self.address)
    }
}

/// Decoded instruction.
///
/// Operands that address stack cells or instructions are unsigned; the
/// operands an opcode ignores are dropped during decoding.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Instruction {
    Lit(Word),
    Opr(OprType),
    Lod { level: usize, address: usize },
    Sto { level: usize, address: usize },
    Cal { level: usize, address: usize },
    Inc(usize),
    Jmp(usize),
    Jpc(usize),
    Sio(SioType),
    Lda(usize),
    Sta(usize),
}

impl Instruction {
    /// Decodes a raw instruction, rejecting values outside the closed enumerations.
    pub fn decode(raw: RawInstruction) -> Result<Self, VMError> {
        let op = OpCode::try_from(raw.op)?;
        let level = || operand(op, "level", raw.level);
        let address = || operand(op, "address", raw.address);

        Ok(match op {
            OpCode::Lit => Instruction::Lit(raw.address),
            OpCode::Opr => Instruction::Opr(OprType::from_selector(raw.address)?),
            OpCode::Lod => Instruction::Lod {
                level: level()?,
                address: address()?,
            },
            OpCode::Sto => Instruction::Sto {
                level: level()?,
                address: address()?,
            },
            OpCode::Cal => Instruction::Cal {
                level: level()?,
                address: address()?,
            },
            OpCode::Inc => Instruction::Inc(address()?),
            OpCode::Jmp => Instruction::Jmp(address()?),
            OpCode::Jpc => Instruction::Jpc(address()?),
            OpCode::Sio => Instruction::Sio(SioType::from_selector(raw.address)?),
            OpCode::Lda => Instruction::Lda(address()?),
            OpCode::Sta => Instruction::Sta(address()?),
        })
    }

    /// Returns the primary opcode of this instruction.
    pub const fn opcode(&self) -> OpCode {
        match self {
            Instruction::Lit(_) => OpCode::Lit,
            Instruction::Opr(_) => OpCode::Opr,
            Instruction::Lod { .. } => OpCode::Lod,
            Instruction::Sto { .. } => OpCode::Sto,
            Instruction::Cal { .. } => OpCode::Cal,
            Instruction::Inc(_) => OpCode::Inc,
            Instruction::Jmp(_) => OpCode::Jmp,
            Instruction::Jpc(_) => OpCode::Jpc,
            Instruction::Sio(_) => OpCode::Sio,
            Instruction::Lda(_) => OpCode::Lda,
            Instruction::Sta(_) => OpCode::Sta,
        }
    }

    /// Encodes back to the raw triple; ignored levels are written as zero.
    pub fn encode(&self) -> RawInstruction {
        let (level, address) = match *self {
            Instruction::Lit(value) => (0, value),
            Instruction::Opr(op) => (0, op.selector()),
            Instruction::Sio(op) => (0, op.selector()),
            Instruction::Lod { level, address }
            | Instruction::Sto { level, address }
            | Instruction::Cal { level, address } => (to_word(level), to_word(address)),
            Instruction::Inc(address)
            | Instruction::Jmp(address)
            | Instruction::Jpc(address)
            | Instruction::Lda(address)
            | Instruction::Sta(address) => (0, to_word(address)),
        };
        RawInstruction::new(self.opcode() as u8, level, address)
    }
}

impl TryFrom<RawInstruction> for Instruction {
    type Error = VMError;

    fn try_from(raw: RawInstruction) -> Result<Self, Self::Error> {
        Instruction::decode(raw)
    }
}

impl From<Instruction> for RawInstruction {
    fn from(instruction: Instruction) -> Self {
        instruction.encode()
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = self.opcode();
        match *self {
            Instruction::Opr(sub) => write!(f, "{op} 0 {sub}"),
            Instruction::Sio(sub) => write!(f, "{op} 0 {sub}"),
            _ => {
                let raw = self.encode();
                write!(f, "{op} {} {}", raw.level, raw.address)
            }
        }
    }
}

fn operand(op: OpCode, field: &'static str, value: Word) -> Result<usize, VMError> {
    usize::try_from(value).map_err(|_| VMError::InvalidOperand {
        opcode: op.mnemonic(),
        field,
        value,
    })
}

fn to_word(value: usize) -> Word {
    Word::try_from(value).unwrap_or(Word::MAX)
}
