//! Main memory.
//!
//! One flat address space holds the variable base (address 0), the
//! program's instruction records (addresses 1..=N) and the variable cells
//! the compiler placed after `halt`. Stores replace a cell with a bare
//! word, so self-modifying programs are possible.
//!
//! All transfers go through a single latch: `read` fills it from a cell,
//! `write` empties it into a cell.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Word;
use crate::program::{Instruction, Program};

/// A memory cell: either a loaded record or a word stored at run time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cell {
    Word(Word),
    Instruction(Instruction),
}

impl Cell {
    /// The numeric value of the cell; a record contributes its argument.
    pub fn value(&self) -> Option<Word> {
        match self {
            Cell::Word(value) => Some(*value),
            Cell::Instruction(instr) => instr.arg,
        }
    }
}

impl Default for Cell {
    fn default() -> Self {
        Cell::Word(0)
    }
}

/// Word-addressed memory with a read/write latch.
#[derive(Clone, Serialize, Deserialize)]
pub struct Memory {
    cells: Vec<Cell>,
    latch: Cell,
    variable_base: Word,
}

impl Memory {
    /// Lay out `program` behind the variable base.
    pub fn load(program: &Program, variable_base: Word) -> Self {
        let mut cells = Vec::with_capacity(program.len() + 1);
        cells.push(Cell::Word(variable_base));
        cells.extend(program.instructions.iter().cloned().map(Cell::Instruction));
        Self {
            cells,
            latch: Cell::default(),
            variable_base,
        }
    }

    /// Fill the latch from `addr`.
    pub fn read(&mut self, addr: Word) -> Result<(), MemoryError> {
        let index = self.index(addr)?;
        self.latch = self.cells[index].clone();
        Ok(())
    }

    /// Store the latch into `addr`.
    pub fn write(&mut self, addr: Word) -> Result<(), MemoryError> {
        let index = self.index(addr)?;
        self.cells[index] = self.latch.clone();
        Ok(())
    }

    /// Borrow a cell without touching the latch.
    pub fn cell(&self, addr: Word) -> Result<&Cell, MemoryError> {
        let index = self.index(addr)?;
        Ok(&self.cells[index])
    }

    pub fn latch(&self) -> &Cell {
        &self.latch
    }

    pub fn set_latch(&mut self, cell: Cell) {
        self.latch = cell;
    }

    /// The variable-memory base as loaded into address 0.
    ///
    /// Kept apart from the cell so a store to address 0 cannot move the
    /// variable region.
    pub fn variable_base(&self) -> Word {
        self.variable_base
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Dump memory contents (for debugging).
    pub fn dump(&self, start: usize, count: usize) -> Vec<(usize, &Cell)> {
        let end = (start + count).min(self.cells.len());
        (start..end).map(|i| (i, &self.cells[i])).collect()
    }

    fn index(&self, addr: Word) -> Result<usize, MemoryError> {
        usize::try_from(addr)
            .ok()
            .filter(|&index| index < self.cells.len())
            .ok_or(MemoryError::AddressOutOfRange {
                addr,
                size: self.cells.len(),
            })
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let words = self
            .cells
            .iter()
            .filter(|cell| matches!(cell, Cell::Word(_)))
            .count();

        f.debug_struct("Memory")
            .field("total_cells", &self.cells.len())
            .field("word_cells", &words)
            .field("latch", &self.latch)
            .finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("memory address {addr} out of range (0-{})", .size.saturating_sub(1))]
    AddressOutOfRange { addr: Word, size: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::Opcode;

    fn sample() -> Memory {
        let program = Program::new(vec![
            Instruction::with_arg(Opcode::Push, 9),
            Instruction::op(Opcode::Halt),
            Instruction::data(0),
        ]);
        Memory::load(&program, 2)
    }

    #[test]
    fn test_layout() {
        let mem = sample();
        assert_eq!(mem.len(), 4);
        assert_eq!(mem.variable_base(), 2);
        assert_eq!(
            mem.cell(1).unwrap(),
            &Cell::Instruction(Instruction::with_arg(Opcode::Push, 9))
        );
    }

    #[test]
    fn test_latch_roundtrip() {
        let mut mem = sample();
        mem.set_latch(Cell::Word(42));
        mem.write(3).unwrap();
        mem.set_latch(Cell::Word(0));
        mem.read(3).unwrap();
        assert_eq!(mem.latch(), &Cell::Word(42));
        assert_eq!(mem.cell(3).unwrap().value(), Some(42));
    }

    #[test]
    fn test_bounds() {
        let mut mem = sample();
        assert!(mem.read(3).is_ok());
        assert_eq!(
            mem.read(4),
            Err(MemoryError::AddressOutOfRange { addr: 4, size: 4 })
        );
        assert!(mem.write(-1).is_err());
    }
}
