//! The control unit.
//!
//! Replays the microcode ROM row by row against a [`Datapath`]. Every
//! dispatched signal except `Halt` costs one tick; the microsequence of
//! each opcode bumps the instruction counter exactly once.

use slog::{debug, o, trace, Discard, Logger};
use thiserror::Error;

use super::datapath::{Datapath, MachineError};
use super::microcode::{self, entry_row, Rom};
use super::signal::{ControlWord, MicroStep, Signal};
use crate::config::MachineConfig;

/// Execution state of the control unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineState {
    Running,
    /// A `Halt` signal was dispatched.
    Halted,
    /// The instruction ceiling was reached.
    LimitReached,
    /// A fault ended the run.
    Faulted,
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Halted,
    InstructionLimit,
    Faulted,
}

/// What a run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Printed and emitted tokens, in order.
    pub output: Vec<String>,
    pub instructions: u64,
    pub ticks: u64,
    pub termination: Termination,
}

impl RunReport {
    pub fn output_text(&self) -> String {
        self.output.concat()
    }
}

/// A fault, with everything the machine produced before it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{source} (after {} instructions, {} ticks)", .report.instructions, .report.ticks)]
pub struct RunError {
    pub source: MachineError,
    pub report: RunReport,
}

/// Drives a datapath through the microcode.
pub struct ControlUnit {
    datapath: Datapath,
    rom: Rom,
    mc_address: usize,
    ticks: u64,
    instructions: u64,
    limit: u64,
    state: MachineState,
    logger: Logger,
}

impl ControlUnit {
    /// Control unit running the built-in microcode.
    pub fn new(datapath: Datapath, config: &MachineConfig) -> Self {
        Self::with_microcode(datapath, config, microcode::rom())
    }

    /// Control unit running an arbitrary ROM image.
    pub fn with_microcode(datapath: Datapath, config: &MachineConfig, rom: Rom) -> Self {
        Self {
            datapath,
            rom,
            mc_address: 0,
            ticks: 0,
            instructions: 0,
            limit: config.instruction_limit,
            state: MachineState::Running,
            logger: Logger::root(Discard, o!()),
        }
    }

    /// Attach a logger to the control unit and its datapath.
    pub fn with_logger<L: Into<Option<Logger>>>(mut self, logger: L) -> Self {
        if let Some(logger) = logger.into() {
            self.datapath
                .set_logger(logger.new(o!("unit" => "datapath")));
            self.logger = logger.new(o!("unit" => "control"));
        }
        self
    }

    pub fn state(&self) -> MachineState {
        self.state
    }

    pub fn datapath(&self) -> &Datapath {
        &self.datapath
    }

    pub fn datapath_mut(&mut self) -> &mut Datapath {
        &mut self.datapath
    }

    pub fn mc_address(&self) -> usize {
        self.mc_address
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn instructions(&self) -> u64 {
        self.instructions
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Signals of the row at `address`; undecodable words are skipped.
    pub fn row_signals(&self, address: usize) -> Vec<Signal> {
        self.rom
            .get(address)
            .map(|row| row.iter().filter_map(|w| Signal::decode(*w)).collect())
            .unwrap_or_default()
    }

    /// Execute one microcode row.
    ///
    /// A stopped machine is left untouched. Any error leaves the machine
    /// in [`MachineState::Faulted`].
    pub fn step_row(&mut self) -> Result<MachineState, MachineError> {
        if self.state != MachineState::Running {
            return Ok(self.state);
        }
        if self.instructions >= self.limit {
            debug!(self.logger, "instruction limit reached"; "limit" => self.limit);
            self.state = MachineState::LimitReached;
            return Ok(self.state);
        }

        match self.execute_row() {
            Ok(()) => Ok(self.state),
            Err(e) => {
                debug!(self.logger, "fault"; "error" => %e, "mc" => self.mc_address, "tick" => self.ticks);
                self.state = MachineState::Faulted;
                Err(e)
            }
        }
    }

    /// Execute rows until the next fetch begins or the machine stops.
    pub fn step_instruction(&mut self) -> Result<MachineState, MachineError> {
        loop {
            let state = self.step_row()?;
            if state != MachineState::Running || self.mc_address == 0 {
                return Ok(state);
            }
        }
    }

    /// Run until halt, the instruction limit, or a fault.
    pub fn run(&mut self) -> Result<RunReport, RunError> {
        while self.state == MachineState::Running {
            if let Err(source) = self.step_row() {
                return Err(RunError {
                    source,
                    report: self.report(),
                });
            }
        }
        Ok(self.report())
    }

    /// Snapshot of output and counters.
    pub fn report(&self) -> RunReport {
        let termination = match self.state {
            MachineState::Halted => Termination::Halted,
            MachineState::LimitReached => Termination::InstructionLimit,
            MachineState::Running | MachineState::Faulted => Termination::Faulted,
        };
        RunReport {
            output: self.datapath.output().to_vec(),
            instructions: self.instructions,
            ticks: self.ticks,
            termination,
        }
    }

    fn execute_row(&mut self) -> Result<(), MachineError> {
        let mc = self.mc_address;
        let width = self
            .rom
            .get(mc)
            .map(Vec::len)
            .ok_or(MachineError::InvalidMicrocodeAddress(mc))?;

        // Rows without an address signal fall through to the next one.
        let mut next = mc + 1;
        for index in 0..width {
            let word: ControlWord = self.rom[mc][index];
            let signal = Signal::decode(word).ok_or(MachineError::InvalidSignal(word))?;

            self.dispatch(signal, &mut next)?;
            if self.state == MachineState::Halted {
                debug!(self.logger, "halted";
                    "instructions" => self.instructions, "ticks" => self.ticks);
                return Ok(());
            }

            self.ticks += 1;
            let dp = &self.datapath;
            trace!(self.logger, "tick";
                "tick" => self.ticks,
                "pc" => dp.regs.pc,
                "ar" => dp.regs.ar,
                "mc" => mc,
                "signal" => ?signal,
                "tos" => ?dp.regs.tos,
                "stack" => ?dp.stack.as_slice()
            );
        }

        self.mc_address = next;
        Ok(())
    }

    fn dispatch(&mut self, signal: Signal, next: &mut usize) -> Result<(), MachineError> {
        match signal {
            Signal::AddressRegister(src) => self.datapath.control_address_register(src)?,
            Signal::Memory(op) => self.datapath.control_memory(op)?,
            Signal::InstructionRegister => self.datapath.latch_instruction_register(),
            Signal::TopOfStack(src) => self.datapath.control_top_of_stack(src)?,
            Signal::ProgramCounter => self.datapath.advance_program_counter(),
            Signal::DataStack(op) => self.datapath.control_data_stack(op)?,
            Signal::AluOperands => self.datapath.load_alu_operands()?,
            Signal::Alu(op) => self.datapath.execute_alu(op)?,
            Signal::BufferRegister => self.datapath.load_buffer_register(),
            Signal::Io(op) => self.datapath.control_io(op)?,
            Signal::Jump(kind) => self.datapath.handle_jump(kind)?,
            Signal::MicrocodeAddress(step) => *next = self.microcode_target(step)?,
            Signal::InstructionCounter => self.instructions += 1,
            Signal::Halt => self.state = MachineState::Halted,
        }
        Ok(())
    }

    fn microcode_target(&self, step: MicroStep) -> Result<usize, MachineError> {
        Ok(match step {
            MicroStep::Next => self.mc_address + 1,
            MicroStep::Zero => 0,
            MicroStep::Opcode => {
                let regs = &self.datapath.regs;
                let opcode = regs
                    .ir
                    .opcode
                    .ok_or(MachineError::NotAnInstruction { pc: regs.pc })?;
                entry_row(opcode)
            }
        })
    }
}

impl std::fmt::Debug for ControlUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlUnit")
            .field("state", &self.state)
            .field("mc_address", &self.mc_address)
            .field("ticks", &self.ticks)
            .field("instructions", &self.instructions)
            .field("datapath", &self.datapath)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::capture::Capture;
    use crate::machine::stack::StackError;
    use crate::program::{Instruction, Opcode, Program};

    fn op(opcode: Opcode) -> Instruction {
        Instruction::op(opcode)
    }

    fn arg(opcode: Opcode, value: i32) -> Instruction {
        Instruction::with_arg(opcode, value)
    }

    fn machine(code: Vec<Instruction>, input: &str, config: MachineConfig) -> ControlUnit {
        let program = Program::new(code);
        let datapath = Datapath::new(&program, input, &config).unwrap();
        ControlUnit::new(datapath, &config)
    }

    fn run(code: Vec<Instruction>, input: &str) -> RunReport {
        machine(code, input, MachineConfig::default()).run().unwrap()
    }

    #[test]
    fn test_halt_only() {
        let report = run(vec![op(Opcode::Halt)], "");
        assert!(report.output.is_empty());
        assert_eq!(report.instructions, 1);
        assert_eq!(report.ticks, 6);
        assert_eq!(report.termination, Termination::Halted);
    }

    #[test]
    fn test_sum_and_print() {
        let report = run(
            vec![
                arg(Opcode::Push, 5),
                arg(Opcode::Push, 3),
                op(Opcode::Sum),
                op(Opcode::Print),
                op(Opcode::Halt),
            ],
            "",
        );
        assert_eq!(report.output_text(), "8");
        assert_eq!(report.instructions, 5);
        assert_eq!(report.ticks, 53);
        assert_eq!(report.termination, Termination::Halted);
    }

    #[test]
    fn test_operand_order() {
        let binary = |opcode| {
            run(
                vec![
                    arg(Opcode::Push, 7),
                    arg(Opcode::Push, 2),
                    op(opcode),
                    op(Opcode::Print),
                    op(Opcode::Halt),
                ],
                "",
            )
            .output_text()
        };
        // First operand is the most recent push.
        assert_eq!(binary(Opcode::Sub), "-5");
        assert_eq!(binary(Opcode::Mul), "14");
        assert_eq!(binary(Opcode::Div), "0");
        assert_eq!(binary(Opcode::Mod), "2");
        assert_eq!(binary(Opcode::More), "1");
        assert_eq!(binary(Opcode::Less), "0");
        assert_eq!(binary(Opcode::Eq), "0");
        assert_eq!(binary(Opcode::NotEq), "1");
    }

    #[test]
    fn test_variable_round_trip() {
        let report = run(
            vec![
                arg(Opcode::Push, 42),
                arg(Opcode::AddrOnTop, 1),
                op(Opcode::SaveVar),
                arg(Opcode::AddrOnTop, 1),
                op(Opcode::VarOnTop),
                op(Opcode::Print),
                op(Opcode::Halt),
                Instruction::data(0),
            ],
            "",
        );
        assert_eq!(report.output_text(), "42");
        assert_eq!(report.instructions, 7);
    }

    fn branch_program(second: i32) -> Vec<Instruction> {
        vec![
            arg(Opcode::Push, 1),
            arg(Opcode::Push, second),
            op(Opcode::Eq),
            arg(Opcode::Jzs, 6),
            arg(Opcode::Push, 111),
            op(Opcode::Print),
            arg(Opcode::Push, 222),
            op(Opcode::Print),
            op(Opcode::Halt),
        ]
    }

    #[test]
    fn test_jzs_taken_on_false_comparison() {
        assert_eq!(run(branch_program(2), "").output_text(), "222");
    }

    #[test]
    fn test_jzs_falls_through_on_true_comparison() {
        assert_eq!(run(branch_program(1), "").output_text(), "111222");
    }

    #[test]
    fn test_read_and_emit() {
        let report = run(
            vec![
                op(Opcode::Read),
                op(Opcode::Emit),
                op(Opcode::Read),
                op(Opcode::Print),
                op(Opcode::Halt),
            ],
            "h",
        );
        assert_eq!(report.output, vec!["h".to_string(), "0".to_string()]);
    }

    #[test]
    fn test_swap_and_dup() {
        let report = run(
            vec![
                arg(Opcode::Push, 1),
                arg(Opcode::Push, 2),
                op(Opcode::Swap),
                op(Opcode::Print),
                op(Opcode::Print),
                arg(Opcode::Push, 9),
                op(Opcode::Dup),
                op(Opcode::Sum),
                op(Opcode::Print),
                op(Opcode::Halt),
            ],
            "",
        );
        assert_eq!(report.output_text(), "1218");
    }

    #[test]
    fn test_stack_overflow_is_fatal() {
        let config = MachineConfig {
            stack_size: 1,
            ..MachineConfig::default()
        };
        let mut cu = machine(
            vec![
                arg(Opcode::Push, 1),
                arg(Opcode::Push, 2),
                arg(Opcode::Push, 3),
                op(Opcode::Halt),
            ],
            "",
            config,
        );
        let err = cu.run().unwrap_err();
        assert_eq!(err.source, MachineError::StackError(StackError::Overflow(1)));
        assert_eq!(err.report.instructions, 2);
        assert_eq!(err.report.termination, Termination::Faulted);
        assert_eq!(cu.state(), MachineState::Faulted);
    }

    #[test]
    fn test_division_by_zero_is_fatal() {
        let mut cu = machine(
            vec![
                arg(Opcode::Push, 0),
                arg(Opcode::Push, 1),
                op(Opcode::Div),
                op(Opcode::Halt),
            ],
            "",
            MachineConfig::default(),
        );
        assert!(matches!(
            cu.run(),
            Err(RunError {
                source: MachineError::AluError(_),
                ..
            })
        ));
    }

    #[test]
    fn test_corrupted_rom_word() {
        let config = MachineConfig::default();
        let program = Program::new(vec![
            arg(Opcode::Push, 1),
            arg(Opcode::Push, 2),
            op(Opcode::Sum),
            op(Opcode::Halt),
        ]);
        let datapath = Datapath::new(&program, "", &config).unwrap();
        let mut rom = microcode::rom();
        rom[entry_row(Opcode::Sum)][0] = ControlWord(0xFFFF);

        let mut cu = ControlUnit::with_microcode(datapath, &config, rom);
        let err = cu.run().unwrap_err();
        assert_eq!(err.source, MachineError::InvalidSignal(ControlWord(0xFFFF)));
        assert_eq!(err.report.instructions, 2);
        assert_eq!(err.report.ticks, 27);

        // A faulted machine does not move.
        assert_eq!(cu.step_row(), Ok(MachineState::Faulted));
        assert_eq!(cu.ticks(), 27);
    }

    #[test]
    fn test_instruction_limit() {
        let config = MachineConfig {
            instruction_limit: 5,
            ..MachineConfig::default()
        };
        let mut cu = machine(
            vec![
                arg(Opcode::Push, 7),
                op(Opcode::Print),
                arg(Opcode::Jmp, 0),
                op(Opcode::Halt),
            ],
            "",
            config,
        );
        let report = cu.run().unwrap();
        assert_eq!(report.termination, Termination::InstructionLimit);
        assert_eq!(report.instructions, 5);
        assert_eq!(report.output_text(), "77");
        assert_eq!(cu.state(), MachineState::LimitReached);
    }

    #[test]
    fn test_dispatch_on_data_cell() {
        let mut cu = machine(
            vec![arg(Opcode::Jmp, 2), op(Opcode::Halt), Instruction::data(5)],
            "",
            MachineConfig::default(),
        );
        assert_eq!(
            cu.run().unwrap_err().source,
            MachineError::NotAnInstruction { pc: 3 }
        );
    }

    #[test]
    fn test_step_instruction_returns_to_fetch() {
        let mut cu = machine(
            vec![arg(Opcode::Push, 4), op(Opcode::Halt)],
            "",
            MachineConfig::default(),
        );
        assert_eq!(cu.step_instruction(), Ok(MachineState::Running));
        assert_eq!(cu.mc_address(), 0);
        assert_eq!(cu.instructions(), 1);
        assert_eq!(cu.ticks(), 11);
        assert_eq!(cu.datapath().regs.tos, Some(4));

        assert_eq!(cu.step_instruction(), Ok(MachineState::Halted));
        assert_eq!(cu.instructions(), 2);
    }

    #[test]
    fn test_step_row_moves_one_row() {
        let mut cu = machine(vec![op(Opcode::Halt)], "", MachineConfig::default());
        cu.step_row().unwrap();
        assert_eq!(cu.mc_address(), 1);
        assert_eq!(cu.ticks(), 3);
        cu.step_row().unwrap();
        assert_eq!(cu.mc_address(), entry_row(Opcode::Halt));
    }

    #[test]
    fn test_every_tick_is_traced() {
        let capture = Capture::new();
        let config = MachineConfig::default();
        let program = Program::new(vec![arg(Opcode::Push, 5), op(Opcode::Print), op(Opcode::Halt)]);
        let datapath = Datapath::new(&program, "", &config).unwrap();
        let report = ControlUnit::new(datapath, &config)
            .with_logger(capture.logger())
            .run()
            .unwrap();

        assert_eq!(report.ticks, 30);
        assert_eq!(capture.count(slog::Level::Trace, "tick") as u64, report.ticks);
        assert_eq!(capture.count(slog::Level::Debug, "print"), 1);
        assert_eq!(capture.count(slog::Level::Debug, "halted"), 1);
    }

    #[test]
    fn test_runs_are_deterministic() {
        let code = branch_program(2);
        let a = run(code.clone(), "");
        let b = run(code, "");
        assert_eq!(a, b);
    }
}
