//! Listing renderer.
//!
//! Converts instruction records and memory cells back to readable text.

use super::{Instruction, Program};
use crate::machine::memory::Cell;

/// Format a single memory cell.
pub fn format_cell(cell: &Cell) -> String {
    match cell {
        Cell::Word(value) => format!("{}", value),
        Cell::Instruction(instr) => format_instruction(instr),
    }
}

/// Format one instruction with its source annotation, if any.
pub fn format_instruction(instr: &Instruction) -> String {
    match &instr.term {
        Some(tag) => format!("{:<18} ; {}:{} {:?}", instr.to_string(), tag.line(), tag.word(), tag.token()),
        None => instr.to_string(),
    }
}

/// Disassemble a whole program, one line per memory address.
pub fn disassemble(program: &Program) -> String {
    let mut output = String::new();
    output.push_str("; stack machine listing\n");
    output.push_str("; ---------------------\n\n");

    match program.variable_base() {
        Ok(base) => output.push_str(&format!("000: {:<18} ; variable base\n", base)),
        Err(e) => output.push_str(&format!("000: ???                ; {}\n", e)),
    }

    for (index, instr) in program.instructions.iter().enumerate() {
        output.push_str(&format!("{:03}: {}\n", index + 1, format_instruction(instr)));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::Opcode;

    #[test]
    fn test_format_cells() {
        assert_eq!(format_cell(&Cell::Word(-7)), "-7");
        let cell = Cell::Instruction(Instruction::with_arg(Opcode::Push, 3));
        assert_eq!(format_cell(&cell), "push 3");
    }

    #[test]
    fn test_disassemble() {
        let program = Program::new(vec![
            Instruction::with_arg(Opcode::Push, 5).tagged(1, 1, "5"),
            Instruction::op(Opcode::Halt),
        ]);
        let text = disassemble(&program);
        assert!(text.contains("000: 2"));
        assert!(text.contains("001: push 5"));
        assert!(text.contains("; 1:1 \"5\""));
        assert!(text.contains("002: halt"));
    }
}
