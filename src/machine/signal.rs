//! Control signals and their ROM encoding.
//!
//! A microcode row is a set of signals fired in one step. Each signal
//! belongs to exactly one category, and each category is handled by one
//! datapath (or control unit) method.
//!
//! In the microcode ROM a signal is stored as a 16-bit control word:
//! the high byte selects the category, the low byte the variant.
//!
//! ```text
//! 15       8 7        0
//! [category] [ variant]
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use super::alu::AluOp;

/// Source for the address register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressSource {
    ProgramCounter,
    TopOfStack,
}

/// Memory latch operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryOp {
    /// Latch ← memory[AR]
    Read,
    /// memory[AR] ← latch
    Write,
    /// Latch ← TOS
    LatchTopOfStack,
}

/// Source for the top-of-stack register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TosSource {
    /// Raw cell at AR, bypassing the latch
    Memory,
    /// IR argument
    Immediate,
    /// Buffer register
    Buffer,
    /// ALU result
    Alu,
    /// IR argument plus the variable base
    Variable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StackOp {
    Push,
    Pop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IoOp {
    Print,
    Read,
    Emit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JumpKind {
    Always,
    IfZero,
}

/// How the microcode address moves after the current row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MicroStep {
    /// Jump to the entry row of the decoded opcode
    Opcode,
    /// Continue with the next row
    Next,
    /// Back to the fetch sequence
    Zero,
}

/// One control signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Signal {
    AddressRegister(AddressSource),
    Memory(MemoryOp),
    /// IR ← decoded memory latch
    InstructionRegister,
    TopOfStack(TosSource),
    /// PC ← PC + 1
    ProgramCounter,
    DataStack(StackOp),
    /// ALU first ← TOS, second ← popped stack value
    AluOperands,
    Alu(AluOp),
    /// BR ← popped stack value
    BufferRegister,
    Io(IoOp),
    Jump(JumpKind),
    MicrocodeAddress(MicroStep),
    InstructionCounter,
    Halt,
}

/// A signal as stored in the microcode ROM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ControlWord(pub u16);

impl ControlWord {
    pub fn new(category: u8, variant: u8) -> Self {
        Self(((category as u16) << 8) | variant as u16)
    }

    pub fn category(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn variant(self) -> u8 {
        (self.0 & 0xFF) as u8
    }
}

impl fmt::Display for ControlWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

impl Signal {
    /// Encode to a control word.
    pub fn encode(self) -> ControlWord {
        let (category, variant) = match self {
            Signal::AddressRegister(src) => (0, src as u8),
            Signal::Memory(op) => (1, op as u8),
            Signal::InstructionRegister => (2, 0),
            Signal::TopOfStack(src) => (3, src as u8),
            Signal::ProgramCounter => (4, 0),
            Signal::DataStack(op) => (5, op as u8),
            Signal::AluOperands => (6, 0),
            Signal::Alu(op) => (7, op.index()),
            Signal::BufferRegister => (8, 0),
            Signal::Io(op) => (9, op as u8),
            Signal::Jump(kind) => (10, kind as u8),
            Signal::MicrocodeAddress(step) => (11, step as u8),
            Signal::InstructionCounter => (12, 0),
            Signal::Halt => (13, 0),
        };
        ControlWord::new(category, variant)
    }

    /// Decode a control word, or `None` if it names no signal.
    pub fn decode(word: ControlWord) -> Option<Self> {
        use self::Signal::*;

        let signal = match (word.category(), word.variant()) {
            (0, 0) => AddressRegister(AddressSource::ProgramCounter),
            (0, 1) => AddressRegister(AddressSource::TopOfStack),
            (1, 0) => Memory(MemoryOp::Read),
            (1, 1) => Memory(MemoryOp::Write),
            (1, 2) => Memory(MemoryOp::LatchTopOfStack),
            (2, 0) => InstructionRegister,
            (3, 0) => TopOfStack(TosSource::Memory),
            (3, 1) => TopOfStack(TosSource::Immediate),
            (3, 2) => TopOfStack(TosSource::Buffer),
            (3, 3) => TopOfStack(TosSource::Alu),
            (3, 4) => TopOfStack(TosSource::Variable),
            (4, 0) => ProgramCounter,
            (5, 0) => DataStack(StackOp::Push),
            (5, 1) => DataStack(StackOp::Pop),
            (6, 0) => AluOperands,
            (7, index) => Alu(AluOp::from_index(index)?),
            (8, 0) => BufferRegister,
            (9, 0) => Io(IoOp::Print),
            (9, 1) => Io(IoOp::Read),
            (9, 2) => Io(IoOp::Emit),
            (10, 0) => Jump(JumpKind::Always),
            (10, 1) => Jump(JumpKind::IfZero),
            (11, 0) => MicrocodeAddress(MicroStep::Opcode),
            (11, 1) => MicrocodeAddress(MicroStep::Next),
            (11, 2) => MicrocodeAddress(MicroStep::Zero),
            (12, 0) => InstructionCounter,
            (13, 0) => Halt,
            _ => return None,
        };
        Some(signal)
    }
}

impl From<Signal> for ControlWord {
    fn from(signal: Signal) -> Self {
        signal.encode()
    }
}
