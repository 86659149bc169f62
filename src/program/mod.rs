//! Programs as produced by the compiler.
//!
//! This module provides:
//! - The instruction record model (opcode, immediate, source tag)
//! - The JSON instruction-stream file format
//! - A listing renderer (memory address → readable text)

pub mod file;
pub mod instruction;
pub mod listing;

pub use file::{load_program, save_program};
pub use instruction::{Instruction, Opcode, SourceTag};
pub use listing::{disassemble, format_cell};

use crate::machine::Word;
use thiserror::Error;

/// A loaded instruction stream.
///
/// Record `i` lands at memory address `i + 1`; address 0 is reserved for
/// the variable-memory base.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    pub instructions: Vec<Instruction>,
}

impl Program {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    /// Parse the JSON instruction-stream format.
    pub fn from_json(text: &str) -> Result<Self, ProgramError> {
        let instructions: Vec<Instruction> =
            serde_json::from_str(text).map_err(|e| ProgramError::ParseError(e.to_string()))?;
        Ok(Self { instructions })
    }

    /// Render the JSON instruction-stream format, one record per line.
    pub fn to_json(&self) -> Result<String, ProgramError> {
        let records = self
            .instructions
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ProgramError::ParseError(e.to_string()))?;
        Ok(format!("[{}]", records.join(",\n")))
    }

    /// Memory address of the first `halt` record.
    ///
    /// Variables are addressed relative to this base, so the first variable
    /// (relative index 1) lives right after the `halt`.
    pub fn variable_base(&self) -> Result<Word, ProgramError> {
        let index = self
            .instructions
            .iter()
            .position(Instruction::is_halt)
            .ok_or(ProgramError::MissingHalt)?;
        Word::try_from(index + 1).map_err(|_| ProgramError::TooLarge(self.instructions.len()))
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

impl From<Vec<Instruction>> for Program {
    fn from(instructions: Vec<Instruction>) -> Self {
        Self::new(instructions)
    }
}

/// Errors that can occur while loading or saving programs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgramError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("malformed instruction stream: {0}")]
    ParseError(String),

    #[error("program has no halt instruction")]
    MissingHalt,

    #[error("program of {0} records does not fit the address space")]
    TooLarge(usize),
}
