//! The datapath.
//!
//! Owns the registers, ALU, data stack, memory and the I/O buffers, and
//! exposes one handler per signal category. Handlers are called by the
//! control unit; nothing here decides what happens next.

use std::collections::VecDeque;

use slog::{debug, o, warn, Discard, Logger};
use thiserror::Error;

use super::alu::{Alu, AluError, AluOp};
use super::memory::{Cell, Memory, MemoryError};
use super::registers::Registers;
use super::signal::{AddressSource, ControlWord, IoOp, JumpKind, MemoryOp, StackOp, TosSource};
use super::stack::{Stack, StackError};
use super::Word;
use crate::config::MachineConfig;
use crate::program::{Instruction, Program, ProgramError};

/// Registers, ALU, stack, memory and I/O of one machine.
pub struct Datapath {
    pub regs: Registers,
    pub alu: Alu,
    pub stack: Stack,
    pub mem: Memory,
    input: VecDeque<char>,
    output: Vec<String>,
    logger: Logger,
}

impl Datapath {
    /// Build a datapath for `program` with the given input characters.
    pub fn new(program: &Program, input: &str, config: &MachineConfig) -> Result<Self, MachineError> {
        Self::with_logger(program, input, config, None::<Logger>)
    }

    /// Like [`Datapath::new`], logging I/O to `logger`.
    pub fn with_logger<L>(
        program: &Program,
        input: &str,
        config: &MachineConfig,
        logger: L,
    ) -> Result<Self, MachineError>
    where
        L: Into<Option<Logger>>,
    {
        let variable_base = program.variable_base()?;
        let logger = logger
            .into()
            .unwrap_or_else(|| Logger::root(Discard, o!()));

        Ok(Self {
            regs: Registers::new(),
            alu: Alu::new(),
            stack: Stack::new(config.stack_size),
            mem: Memory::load(program, variable_base),
            input: input.chars().collect(),
            output: Vec::new(),
            logger,
        })
    }

    pub fn set_logger(&mut self, logger: Logger) {
        self.logger = logger;
    }

    /// Printed and emitted tokens, in order.
    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// All output concatenated.
    pub fn output_text(&self) -> String {
        self.output.concat()
    }

    /// Input characters not yet consumed.
    pub fn pending_input(&self) -> usize {
        self.input.len()
    }

    // ==================== Signal handlers ====================

    pub fn control_address_register(&mut self, src: AddressSource) -> Result<(), MachineError> {
        self.regs.ar = match src {
            AddressSource::ProgramCounter => self.regs.pc,
            AddressSource::TopOfStack => self.tos_word()?,
        };
        Ok(())
    }

    pub fn control_memory(&mut self, op: MemoryOp) -> Result<(), MachineError> {
        match op {
            MemoryOp::Read => self.mem.read(self.regs.ar)?,
            MemoryOp::Write => self.mem.write(self.regs.ar)?,
            MemoryOp::LatchTopOfStack => {
                let value = self.tos_word()?;
                self.mem.set_latch(Cell::Word(value));
            }
        }
        Ok(())
    }

    /// Decode the memory latch into IR. A bare word becomes a record
    /// carrying only that word as its argument.
    pub fn latch_instruction_register(&mut self) {
        self.regs.ir = match self.mem.latch() {
            Cell::Word(value) => Instruction::data(*value),
            Cell::Instruction(instr) => instr.clone(),
        };
    }

    pub fn control_top_of_stack(&mut self, src: TosSource) -> Result<(), MachineError> {
        self.regs.tos = match src {
            TosSource::Alu => Some(self.alu.result),
            TosSource::Buffer => self.regs.br,
            TosSource::Memory => self.mem.cell(self.regs.ar)?.value(),
            TosSource::Immediate => Some(self.immediate()?),
            TosSource::Variable => Some(self.immediate()?.wrapping_add(self.mem.variable_base())),
        };
        Ok(())
    }

    pub fn advance_program_counter(&mut self) {
        self.regs.advance_pc();
    }

    /// Push TOS, or drop the stack's top element.
    pub fn control_data_stack(&mut self, op: StackOp) -> Result<(), MachineError> {
        match op {
            StackOp::Push => self.stack.push(self.regs.tos)?,
            StackOp::Pop => {
                self.stack.pop();
            }
        }
        Ok(())
    }

    /// First operand from TOS, second popped off the stack.
    pub fn load_alu_operands(&mut self) -> Result<(), MachineError> {
        let first = self.tos_word()?;
        let second = self.stack.pop().ok_or(MachineError::EmptyStack)?;
        self.alu.load(first, second);
        Ok(())
    }

    pub fn execute_alu(&mut self, op: AluOp) -> Result<(), MachineError> {
        self.alu.execute(op)?;
        Ok(())
    }

    /// BR ← popped stack value (empty if the stack was empty).
    pub fn load_buffer_register(&mut self) {
        self.regs.br = self.stack.pop();
    }

    pub fn control_io(&mut self, op: IoOp) -> Result<(), MachineError> {
        match op {
            IoOp::Print => {
                let token = self.tos_word()?.to_string();
                debug!(self.logger, "print"; "token" => &token);
                self.output.push(token);
            }
            IoOp::Read => match self.input.pop_front() {
                Some(ch) => {
                    debug!(self.logger, "read"; "char" => %ch.escape_debug());
                    self.regs.tos = Some(ch as u32 as Word);
                }
                None => {
                    warn!(self.logger, "no input left, reading 0");
                    self.regs.tos = Some(0);
                }
            },
            IoOp::Emit => {
                let code = self.tos_word()?;
                let ch = u32::try_from(code)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or(MachineError::InvalidCharacter(code))?;
                debug!(self.logger, "emit"; "char" => %ch.escape_debug());
                self.output.push(ch.to_string());
            }
        }
        Ok(())
    }

    /// Conditional jumps test the ALU zero flag.
    pub fn handle_jump(&mut self, kind: JumpKind) -> Result<(), MachineError> {
        let taken = match kind {
            JumpKind::Always => true,
            JumpKind::IfZero => self.alu.flags.zero,
        };
        if taken {
            let target = self.tos_word()?;
            self.regs.jump(target);
        }
        Ok(())
    }

    // ==================== Helpers ====================

    fn tos_word(&self) -> Result<Word, MachineError> {
        self.regs.tos.ok_or(MachineError::EmptyTopOfStack)
    }

    fn immediate(&self) -> Result<Word, MachineError> {
        self.regs
            .ir
            .arg
            .ok_or(MachineError::MissingArgument { pc: self.regs.pc })
    }
}

impl std::fmt::Debug for Datapath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Datapath")
            .field("regs", &self.regs)
            .field("alu", &self.alu)
            .field("stack", &self.stack.as_slice())
            .field("mem", &self.mem)
            .field("output", &self.output)
            .finish()
    }
}

/// Faults that end a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MachineError {
    #[error("invalid signal {0}")]
    InvalidSignal(ControlWord),

    #[error("microcode address {0} is outside the ROM")]
    InvalidMicrocodeAddress(usize),

    #[error("{0}")]
    StackError(#[from] StackError),

    #[error("memory error: {0}")]
    MemoryError(#[from] MemoryError),

    #[error("ALU error: {0}")]
    AluError(#[from] AluError),

    #[error("program error: {0}")]
    ProgramError(#[from] ProgramError),

    #[error("ALU operand missing: data stack is empty")]
    EmptyStack,

    #[error("top-of-stack register is empty")]
    EmptyTopOfStack,

    #[error("instruction at address {pc} has no argument")]
    MissingArgument { pc: Word },

    #[error("cell at address {pc} is not an instruction")]
    NotAnInstruction { pc: Word },

    #[error("{0} is not a character code")]
    InvalidCharacter(Word),
}
