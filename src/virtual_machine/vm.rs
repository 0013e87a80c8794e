//! Interpreter core.
//!
//! The machine runs a fetch, increment, decode, execute cycle over an
//! immutable [`Program`]. All runtime data lives on a single bounded
//! [`Stack`]; procedures get an activation record whose first three cells
//! hold the frame links:
//!
//! | Offset | Cell                                        |
//! |--------|---------------------------------------------|
//! | 0      | dynamic link (caller's base)                |
//! | 1      | static link (lexically enclosing frame's base) |
//! | 2      | return address                              |
//!
//! Locals follow the links. `LOD`/`STO` reach variables of enclosing scopes
//! by walking `level` static links from the current base.
//!
//! A fresh machine reserves the global frame at stack index 0 (`b = 0`,
//! `sp = 2`). Returning from the global frame ends the run like `SIO HALT`.

pub mod profile;
pub mod registers;
pub mod stack;
pub mod trace;


use crate::virtual_machine::config::VmConfig;
use crate::virtual_machine::errors::{Fault, VMError};
use crate::virtual_machine::io::Io;
use crate::virtual_machine::isa::{Instruction, OprType, SioType, Word};
use crate::virtual_machine::program::Program;
use crate::{debug, error, info};
use profile::ExecutionProfile;
use registers::Registers;
use stack::Stack;
use std::fmt;
use trace::Trace;

/// Cells at the start of every activation record before its locals.
pub const FRAME_HEADER_SIZE: usize = 3;
/// Stack index of the global frame.
pub const GLOBAL_BASE: usize = 0;

const DYNAMIC_LINK: usize = 0;
const STATIC_LINK: usize = 1;
const RETURN_ADDRESS: usize = 2;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum MachineState {
    /// Constructed or reset, nothing executed yet.
    Ready,
    Running,
    /// Stopped normally; see [`HaltReason`].
    Halted,
    /// Stopped by a fault; the machine must be reset to run again.
    Faulted,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum HaltReason {
    /// `SIO HALT` was executed.
    Halt,
    /// `OPR RET` was executed in the global frame.
    ReturnFromMain,
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltReason::Halt => f.write_str("halt"),
            HaltReason::ReturnFromMain => f.write_str("return from main"),
        }
    }
}

/// Result of a run that halted normally.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RunSummary {
    pub reason: HaltReason,
    /// Final registers.
    pub registers: Registers,
    /// Final stack contents, bottom to top.
    pub stack: Vec<Word>,
    /// Instructions executed.
    pub steps: u64,
}

/// What the fetch loop does after an instruction.
enum Flow {
    Continue,
    Halt(HaltReason),
}

/// Stack-based virtual machine.
///
/// Owns its registers, stack and program, so several machines can coexist
/// and run on separate threads. The host talks to a running program only
/// through the [`Io`] adapter passed to [`run`](VM::run) or [`step`](VM::step).
pub struct VM {
    program: Program,
    config: VmConfig,
    stack: Stack,
    /// Index of the next instruction to fetch.
    pc: usize,
    /// Base of the current activation record.
    base: usize,
    state: MachineState,
    halt_reason: Option<HaltReason>,
    fault: Option<Fault>,
    steps: u64,
    profile: ExecutionProfile,
    trace: Option<Trace>,
}

impl VM {
    /// Creates a machine with the default configuration.
    pub fn new(program: Program) -> Self {
        let config = VmConfig::default();
        let mut vm = Self {
            stack: Stack::with_reserved(config.max_stack_size, FRAME_HEADER_SIZE),
            program,
            config,
            pc: 0,
            base: GLOBAL_BASE,
            state: MachineState::Ready,
            halt_reason: None,
            fault: None,
            steps: 0,
            profile: ExecutionProfile::new(),
            trace: None,
        };
        vm.reset();
        vm
    }

    /// Creates a machine with an explicit configuration.
    ///
    /// Fails with [`VMError::InvalidConfig`] when the stack cannot hold the
    /// global frame.
    pub fn with_config(program: Program, config: VmConfig) -> Result<Self, VMError> {
        config.validate()?;
        let mut vm = Self::new(program);
        vm.config = config;
        vm.reset();
        Ok(vm)
    }

    /// Returns the machine to [`MachineState::Ready`] with the same program
    /// and configuration.
    ///
    /// The global frame's three cells are reserved at the bottom of the
    /// stack and cannot be popped.
    pub fn reset(&mut self) {
        // global frame links are never read; the cells are only reserved.
        // `VmConfig::validate` keeps the capacity at or above the frame size.
        self.stack = Stack::with_reserved(self.config.max_stack_size, FRAME_HEADER_SIZE);
        self.pc = 0;
        self.base = GLOBAL_BASE;
        self.state = MachineState::Ready;
        self.halt_reason = None;
        self.fault = None;
        self.steps = 0;
        self.profile = ExecutionProfile::new();
        self.trace = self
            .config
            .trace
            .then(|| Trace::new(self.registers(), self.stack.as_slice()));
    }

    pub fn registers(&self) -> Registers {
        Registers {
            pc: self.pc,
            base: self.base,
            sp: self.stack.sp(),
        }
    }

    /// Stack contents, bottom to top.
    pub fn stack(&self) -> &[Word] {
        self.stack.as_slice()
    }

    pub fn state(&self) -> MachineState {
        self.state
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Instructions executed since the last reset.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn profile(&self) -> &ExecutionProfile {
        &self.profile
    }

    /// The recorded trace, when tracing is enabled.
    pub fn trace(&self) -> Option<&Trace> {
        self.trace.as_ref()
    }

    pub fn halt_reason(&self) -> Option<HaltReason> {
        self.halt_reason
    }

    pub fn fault(&self) -> Option<&Fault> {
        self.fault.as_ref()
    }

    /// Runs until the program halts or faults.
    ///
    /// On a machine that already halted this returns the same summary again;
    /// on a faulted machine it returns the same fault.
    pub fn run<I: Io + ?Sized>(&mut self, io: &mut I) -> Result<RunSummary, Fault> {
        if self.state == MachineState::Ready {
            info!(
                "running program of {} instructions (stack capacity {})",
                self.program.len(),
                self.stack.max_size()
            );
        }
        while self.step(io)? != MachineState::Halted {}
        Ok(self.summary())
    }

    /// Executes exactly one instruction and reports the resulting state.
    ///
    /// Stepping a halted machine does nothing; stepping a faulted machine
    /// returns its fault again.
    pub fn step<I: Io + ?Sized>(&mut self, io: &mut I) -> Result<MachineState, Fault> {
        match self.state {
            MachineState::Halted => return Ok(MachineState::Halted),
            MachineState::Faulted => {
                if let Some(fault) = &self.fault {
                    return Err(fault.clone());
                }
            }
            MachineState::Ready | MachineState::Running => {}
        }
        self.state = MachineState::Running;

        let index = self.pc;
        match self.cycle(io) {
            Ok(Flow::Continue) => Ok(MachineState::Running),
            Ok(Flow::Halt(reason)) => {
                info!(
                    "halted ({reason}) after {} instructions, {}",
                    self.steps,
                    self.registers()
                );
                self.state = MachineState::Halted;
                self.halt_reason = Some(reason);
                Ok(MachineState::Halted)
            }
            Err(error) => {
                let fault = Fault {
                    error,
                    pc: index,
                    registers: self.registers(),
                };
                error!("{fault}");
                self.state = MachineState::Faulted;
                self.fault = Some(fault.clone());
                Err(fault)
            }
        }
    }

    fn summary(&self) -> RunSummary {
        RunSummary {
            reason: self.halt_reason.unwrap_or(HaltReason::Halt),
            registers: self.registers(),
            stack: self.stack.as_slice().to_vec(),
            steps: self.steps,
        }
    }

    /// Fetch, increment, decode, execute.
    fn cycle<I: Io + ?Sized>(&mut self, io: &mut I) -> Result<Flow, VMError> {
        if let Some(limit) = self.config.step_limit
            && self.steps >= limit
        {
            return Err(VMError::StepLimitExceeded { limit });
        }

        let index = self.pc;
        let raw = self.program.fetch(index)?;
        self.pc += 1;
        let instruction = Instruction::decode(raw)?;

        self.steps += 1;
        self.profile.record(instruction.opcode());
        debug!("{index:>4}  {instruction}");

        let flow = self.exec(instruction, io);

        let registers = self.registers();
        if let Some(trace) = self.trace.as_mut() {
            let fault = flow.as_ref().err().cloned();
            trace.record(index, instruction, registers, self.stack.as_slice(), fault);
        }
        flow
    }

    fn exec<I: Io + ?Sized>(
        &mut self,
        instruction: Instruction,
        io: &mut I,
    ) -> Result<Flow, VMError> {
        match instruction {
            Instruction::Lit(value) => self.op_lit(value)?,
            Instruction::Opr(op) => return self.op_opr(op),
            Instruction::Lod { level, address } => self.op_lod(level, address)?,
            Instruction::Sto { level, address } => self.op_sto(level, address)?,
            Instruction::Cal { level, address } => self.op_cal(level, address)?,
            Instruction::Inc(amount) => self.op_inc(amount)?,
            Instruction::Jmp(address) => self.op_jmp(address)?,
            Instruction::Jpc(address) => self.op_jpc(address)?,
            Instruction::Sio(op) => return self.op_sio(op, io),
            Instruction::Lda(address) => self.op_lda(address)?,
            Instruction::Sta(address) => self.op_sta(address)?,
        }
        Ok(Flow::Continue)
    }

    /// Walks `level` static links from the current frame.
    fn resolve(&self, level: usize) -> Result<usize, VMError> {
        let mut base = self.base;
        for _ in 0..level {
            if base == GLOBAL_BASE {
                return Err(VMError::StaticChainExhausted {
                    level,
                    base: self.base,
                });
            }
            base = self.read_link(base, STATIC_LINK)?;
        }
        Ok(base)
    }

    /// Reads a frame link as an index.
    fn read_link(&self, base: usize, slot: usize) -> Result<usize, VMError> {
        let address = base + slot;
        let value = self.stack.read(address)?;
        usize::try_from(value).map_err(|_| VMError::InvalidLink { address, value })
    }

    fn jump(&mut self, target: usize) -> Result<(), VMError> {
        self.program.check_target(target)?;
        self.pc = target;
        Ok(())
    }

    fn op_lit(&mut self, value: Word) -> Result<(), VMError> {
        self.stack.push(value)
    }

    fn op_opr(&mut self, op: OprType) -> Result<Flow, VMError> {
        match op {
            OprType::Ret => return self.op_ret(),
            OprType::InvertValue => {
                let x = self.stack.pop()?;
                let value = x.checked_neg().ok_or(overflow(op))?;
                self.stack.push(value)?;
            }
            OprType::Odd => {
                let x = self.stack.pop()?;
                self.stack.push(Word::from(x % 2 != 0))?;
            }
            OprType::Plus => self.binary(|x, y| x.checked_add(y).ok_or(overflow(op)))?,
            OprType::Minus => self.binary(|x, y| x.checked_sub(y).ok_or(overflow(op)))?,
            OprType::Mul => self.binary(|x, y| x.checked_mul(y).ok_or(overflow(op)))?,
            OprType::Div => self.binary(|x, y| {
                if y == 0 {
                    return Err(VMError::DivisionByZero);
                }
                x.checked_div(y).ok_or(overflow(op))
            })?,
            OprType::Mod => self.binary(|x, y| {
                if y == 0 {
                    return Err(VMError::ModuloByZero);
                }
                x.checked_rem(y).ok_or(overflow(op))
            })?,
            OprType::Eq => self.binary(|x, y| Ok(Word::from(x == y)))?,
            OprType::Neq => self.binary(|x, y| Ok(Word::from(x != y)))?,
            OprType::Less => self.binary(|x, y| Ok(Word::from(x < y)))?,
            OprType::LessEq => self.binary(|x, y| Ok(Word::from(x <= y)))?,
            OprType::Grt => self.binary(|x, y| Ok(Word::from(x > y)))?,
            OprType::GrtEq => self.binary(|x, y| Ok(Word::from(x >= y)))?,
        }
        Ok(Flow::Continue)
    }

    /// Pops `y` then `x` and pushes `f(x, y)`.
    fn binary<F>(&mut self, f: F) -> Result<(), VMError>
    where
        F: FnOnce(Word, Word) -> Result<Word, VMError>,
    {
        let y = self.stack.pop()?;
        let x = self.stack.pop()?;
        self.stack.push(f(x, y)?)
    }

    fn op_ret(&mut self) -> Result<Flow, VMError> {
        if self.base == GLOBAL_BASE {
            return Ok(Flow::Halt(HaltReason::ReturnFromMain));
        }
        let base = self.base;
        let caller = self.read_link(base, DYNAMIC_LINK)?;
        self.read_link(base, STATIC_LINK)?;
        let return_address = self.read_link(base, RETURN_ADDRESS)?;

        self.stack.truncate(base);
        self.pc = return_address;
        self.base = caller;
        Ok(Flow::Continue)
    }

    fn op_lod(&mut self, level: usize, address: usize) -> Result<(), VMError> {
        let base = self.resolve(level)?;
        let value = self.stack.read(base.saturating_add(address))?;
        self.stack.push(value)
    }

    fn op_sto(&mut self, level: usize, address: usize) -> Result<(), VMError> {
        let value = self.stack.pop()?;
        let base = self.resolve(level)?;
        self.stack.write(base.saturating_add(address), value)
    }

    fn op_cal(&mut self, level: usize, address: usize) -> Result<(), VMError> {
        self.program.check_target(address)?;
        let static_link = self.resolve(level)?;
        self.stack.ensure_room(FRAME_HEADER_SIZE)?;

        let frame = self.stack.depth();
        for link in [self.base, static_link, self.pc] {
            self.stack.push(link as Word)?;
        }
        self.base = frame;
        self.pc = address;
        Ok(())
    }

    fn op_inc(&mut self, amount: usize) -> Result<(), VMError> {
        self.stack.grow(amount)
    }

    fn op_jmp(&mut self, address: usize) -> Result<(), VMError> {
        self.jump(address)
    }

    fn op_jpc(&mut self, address: usize) -> Result<(), VMError> {
        if self.stack.pop()? == 0 {
            self.jump(address)?;
        }
        Ok(())
    }

    fn op_sio<I: Io + ?Sized>(&mut self, op: SioType, io: &mut I) -> Result<Flow, VMError> {
        match op {
            SioType::Write => {
                let value = self.stack.pop()?;
                io.write(value)?;
            }
            SioType::Read => {
                self.stack.ensure_room(1)?;
                let value = io.read()?;
                self.stack.push(value)?;
            }
            SioType::Halt => return Ok(Flow::Halt(HaltReason::Halt)),
        }
        Ok(Flow::Continue)
    }

    fn op_lda(&mut self, address: usize) -> Result<(), VMError> {
        let value = self.stack.read(address)?;
        self.stack.push(value)
    }

    fn op_sta(&mut self, address: usize) -> Result<(), VMError> {
        let value = self.stack.pop()?;
        self.stack.write(address, value)
    }
}

fn overflow(op: OprType) -> VMError {
    VMError::IntegerOverflow {
        operation: op.mnemonic(),
    }
}
