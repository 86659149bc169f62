//! Datapath registers.
//!
//! - PC: address of the instruction being executed
//! - AR: staged memory address for the next read/write
//! - IR: the record most recently decoded from the memory latch
//! - BR: scratch register used to reorder the stack
//! - TOS: the top of the data stack, held outside the stack proper
//!
//! TOS and BR can be empty. An empty TOS pushed onto the stack is a no-op,
//! which is how the very first push of a program leaves the stack empty.

use serde::{Deserialize, Serialize};

use super::Word;
use crate::program::Instruction;

/// Address of the first instruction; address 0 holds the variable base.
pub const START_ADDRESS: Word = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    pub pc: Word,
    pub ar: Word,
    pub ir: Instruction,
    pub br: Option<Word>,
    pub tos: Option<Word>,
}

impl Registers {
    pub fn new() -> Self {
        Self {
            pc: START_ADDRESS,
            ar: 0,
            ir: Instruction::default(),
            br: None,
            tos: None,
        }
    }

    /// Reset all registers to the power-on state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Advance PC to the next instruction.
    #[inline]
    pub fn advance_pc(&mut self) {
        self.pc = self.pc.wrapping_add(1);
    }

    /// Point PC at `target`. The closing row of the jump's microsequence
    /// still advances PC, so execution resumes at `target + 1`.
    #[inline]
    pub fn jump(&mut self, target: Word) {
        self.pc = target;
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_on_state() {
        let regs = Registers::new();
        assert_eq!(regs.pc, START_ADDRESS);
        assert_eq!(regs.tos, None);
        assert_eq!(regs.br, None);
    }

    #[test]
    fn test_jump_then_advance() {
        let mut regs = Registers::new();
        regs.jump(7);
        regs.advance_pc();
        assert_eq!(regs.pc, 8);
        regs.reset();
        assert_eq!(regs.pc, START_ADDRESS);
    }
}
