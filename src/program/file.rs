//! Instruction-stream files.
//!
//! The format is a JSON array with one record per memory cell:
//! `{"opcode": "push", "arg": 5, "term": [line, word, "token"]}`.
//! Every key is optional; data cells carry only `arg`.

use std::path::Path;

use super::{Program, ProgramError};

/// Load a program from disk.
pub fn load_program<P: AsRef<Path>>(path: P) -> Result<Program, ProgramError> {
    let text = std::fs::read_to_string(path.as_ref())
        .map_err(|e| ProgramError::IoError(e.to_string()))?;
    Program::from_json(&text)
}

/// Save a program to disk.
pub fn save_program<P: AsRef<Path>>(path: P, program: &Program) -> Result<(), ProgramError> {
    let text = program.to_json()?;
    std::fs::write(path.as_ref(), text).map_err(|e| ProgramError::IoError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{Instruction, Opcode};

    #[test]
    fn test_file_roundtrip() {
        let path = std::env::temp_dir().join(format!("stackmc-file-{}.json", std::process::id()));
        let program = Program::new(vec![
            Instruction::with_arg(Opcode::Push, -12),
            Instruction::op(Opcode::Print),
            Instruction::op(Opcode::Halt),
        ]);

        save_program(&path, &program).unwrap();
        let loaded = load_program(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded, program);
    }

    #[test]
    fn test_missing_file() {
        let result = load_program("/nonexistent/stackmc/program.json");
        assert!(matches!(result, Err(ProgramError::IoError(_))));
    }
}
