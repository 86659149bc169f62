//! TUI debugger.
//!
//! An interactive terminal stepper with:
//! - Memory listing with PC and breakpoint markers
//! - Registers, ALU flags and the current microcode row
//! - Instruction and row stepping, run/pause, breakpoints

mod app;
mod ui;

pub use app::{run_debugger, DebuggerApp};
