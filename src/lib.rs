//! # stackmc
//!
//! A microcoded stack-machine emulator.
//!
//! Programs are linear streams of instruction records (opcode, optional
//! argument, optional source position) produced by an external compiler.
//! The control unit executes them by replaying a fixed microcode table
//! against the datapath, one row of control signals per step, counting
//! every signal as a tick.

pub mod config;
pub mod machine;
pub mod program;

#[cfg(feature = "tui")]
pub mod tui;

// Re-export commonly used types
pub use config::{ConfigError, MachineConfig};
pub use machine::{
    simulate, ControlUnit, Datapath, MachineError, MachineState, RunError, RunReport,
    Termination, Word,
};
pub use program::{load_program, save_program, Instruction, Opcode, Program, ProgramError};

#[cfg(feature = "tui")]
pub use tui::run_debugger;
