//! The microcoded stack machine.
//!
//! - [`Alu`]: 32-bit integer arithmetic and comparisons with flags
//! - [`Stack`]: bounded data stack below the TOS register
//! - [`Memory`]: one address space for code and variables
//! - [`Datapath`]: registers plus one handler per signal category
//! - [`ControlUnit`]: replays the microcode ROM tick by tick

pub mod alu;
pub mod stack;
pub mod memory;
pub mod registers;
pub mod signal;
pub mod microcode;
pub mod datapath;
pub mod control;

#[cfg(test)]
pub(crate) mod capture;

pub use alu::{Alu, AluError, AluOp, Flags, Word};
pub use stack::{Stack, StackError};
pub use memory::{Cell, Memory, MemoryError};
pub use registers::Registers;
pub use signal::{ControlWord, Signal};
pub use datapath::{Datapath, MachineError};
pub use control::{ControlUnit, MachineState, RunError, RunReport, Termination};

use crate::config::MachineConfig;
use crate::program::Program;

/// Load `program`, run it on `input` and report what it produced.
pub fn simulate(
    program: &Program,
    input: &str,
    config: &MachineConfig,
    logger: Option<slog::Logger>,
) -> Result<RunReport, RunError> {
    let datapath = Datapath::new(program, input, config).map_err(|source| RunError {
        source,
        report: RunReport {
            output: Vec::new(),
            instructions: 0,
            ticks: 0,
            termination: Termination::Faulted,
        },
    })?;
    ControlUnit::new(datapath, config).with_logger(logger).run()
}
