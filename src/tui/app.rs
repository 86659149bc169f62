//! Debugger application state and logic.

use std::collections::HashSet;

use crate::config::MachineConfig;
use crate::machine::{ControlUnit, Datapath, MachineError, MachineState, Word};
use crate::program::{format_cell, Program};

/// Instructions executed per frame while running.
const STEPS_PER_FRAME: usize = 64;

/// Debugger application state.
pub struct DebuggerApp {
    /// The machine being debugged.
    pub cu: ControlUnit,
    program: Program,
    input: String,
    config: MachineConfig,
    /// Breakpoints (by PC).
    pub breakpoints: HashSet<Word>,
    /// Is the debugger running continuously?
    pub running: bool,
    pub should_quit: bool,
    pub status: String,
    /// Memory view scroll offset.
    pub mem_scroll: usize,
}

impl DebuggerApp {
    pub fn new(program: Program, input: &str, config: MachineConfig) -> Result<Self, MachineError> {
        let cu = Self::build(&program, input, &config)?;
        Ok(Self {
            cu,
            program,
            input: input.to_string(),
            config,
            breakpoints: HashSet::new(),
            running: false,
            should_quit: false,
            status: "Ready. Press 's' to step, 'r' to run, 'q' to quit.".into(),
            mem_scroll: 0,
        })
    }

    fn build(program: &Program, input: &str, config: &MachineConfig) -> Result<ControlUnit, MachineError> {
        let datapath = Datapath::new(program, input, config)?;
        Ok(ControlUnit::new(datapath, config))
    }

    /// Step one instruction.
    pub fn step(&mut self) {
        let pc = self.cu.datapath().regs.pc;
        let listing = self.cell_text(pc);
        match self.cu.step_instruction() {
            Ok(MachineState::Running) => {
                self.status = format!("PC={:03}: {}", pc, listing);
            }
            Ok(state) => self.stopped(state),
            Err(e) => {
                self.status = format!("Error: {}", e);
                self.running = false;
            }
        }
    }

    /// Step one microcode row.
    pub fn step_row(&mut self) {
        let mc = self.cu.mc_address();
        match self.cu.step_row() {
            Ok(MachineState::Running) => {
                self.status = format!("row {:02} → {:02}", mc, self.cu.mc_address());
            }
            Ok(state) => self.stopped(state),
            Err(e) => {
                self.status = format!("Error: {}", e);
                self.running = false;
            }
        }
    }

    /// Run until halt, breakpoint, or error.
    pub fn run(&mut self) {
        self.running = true;
        self.status = "Running...".into();
    }

    pub fn pause(&mut self) {
        self.running = false;
        self.status = "Paused.".into();
    }

    /// Run one frame of continuous execution.
    pub fn tick(&mut self) {
        for _ in 0..STEPS_PER_FRAME {
            if !self.running {
                return;
            }
            if self.cu.state() != MachineState::Running {
                self.stopped(self.cu.state());
                return;
            }
            self.step();

            let pc = self.cu.datapath().regs.pc;
            if self.running && self.cu.mc_address() == 0 && self.breakpoints.contains(&pc) {
                self.running = false;
                self.status = format!("Breakpoint at PC={}", pc);
            }
        }
    }

    /// Toggle breakpoint at current PC.
    pub fn toggle_breakpoint(&mut self) {
        let pc = self.cu.datapath().regs.pc;
        if self.breakpoints.remove(&pc) {
            self.status = format!("Removed breakpoint at PC={}", pc);
        } else {
            self.breakpoints.insert(pc);
            self.status = format!("Set breakpoint at PC={}", pc);
        }
    }

    /// Reload the program and input.
    pub fn reset(&mut self) {
        match Self::build(&self.program, &self.input, &self.config) {
            Ok(cu) => {
                self.cu = cu;
                self.status = "Reset. Ready.".into();
            }
            Err(e) => self.status = format!("Error: {}", e),
        }
        self.running = false;
    }

    pub fn handle_key(&mut self, code: crossterm::event::KeyCode) {
        use crossterm::event::KeyCode;

        match code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('s') => {
                self.running = false;
                self.step();
            }
            KeyCode::Char('t') => {
                self.running = false;
                self.step_row();
            }
            KeyCode::Char('r') => self.run(),
            KeyCode::Char('p') => self.pause(),
            KeyCode::Char('b') => self.toggle_breakpoint(),
            KeyCode::Char('x') => self.reset(),
            KeyCode::Up => self.scroll_up(),
            KeyCode::Down => self.scroll_down(),
            _ => {}
        }
    }

    pub fn scroll_up(&mut self) {
        self.mem_scroll = self.mem_scroll.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        let last = self.cu.datapath().mem.len().saturating_sub(1);
        if self.mem_scroll < last {
            self.mem_scroll += 1;
        }
    }

    /// Memory listing rows: (address, text, is PC).
    pub fn memory_listing(&self, rows: usize) -> Vec<(usize, String, bool)> {
        let dp = self.cu.datapath();
        dp.mem
            .dump(self.mem_scroll, rows)
            .into_iter()
            .map(|(addr, cell)| (addr, format_cell(cell), addr as i64 == dp.regs.pc as i64))
            .collect()
    }

    fn cell_text(&self, addr: Word) -> String {
        self.cu
            .datapath()
            .mem
            .cell(addr)
            .map(format_cell)
            .unwrap_or_else(|e| e.to_string())
    }

    fn stopped(&mut self, state: MachineState) {
        self.running = false;
        self.status = match state {
            MachineState::LimitReached => format!(
                "Instruction limit ({}) reached after {} ticks",
                self.cu.limit(),
                self.cu.ticks()
            ),
            _ => format!(
                "{:?} after {} instructions, {} ticks",
                state,
                self.cu.instructions(),
                self.cu.ticks()
            ),
        };
    }
}

/// Run the debugger with a program.
pub fn run_debugger(program: Program, input: &str, config: MachineConfig) -> std::io::Result<()> {
    use crossterm::{
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::{stdout, Error, ErrorKind};

    let mut app = DebuggerApp::new(program, input, config)
        .map_err(|e| Error::new(ErrorKind::InvalidInput, e))?;

    enable_raw_mode()?;
    restoring(
        || {
            stdout().execute(EnterAlternateScreen)?;
            let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
            event_loop(&mut terminal, &mut app)
        },
        || {
            disable_raw_mode()?;
            stdout().execute(LeaveAlternateScreen)?;
            Ok(())
        },
    )
}

/// Run `body`, then `restore` whether or not `body` failed. The body's
/// error wins over the restore's.
fn restoring<T>(
    body: impl FnOnce() -> std::io::Result<T>,
    restore: impl FnOnce() -> std::io::Result<()>,
) -> std::io::Result<T> {
    let result = body();
    let restored = restore();
    let value = result?;
    restored?;
    Ok(value)
}

fn event_loop<B: ratatui::backend::Backend>(
    terminal: &mut ratatui::Terminal<B>,
    app: &mut DebuggerApp,
) -> std::io::Result<()> {
    use crossterm::event::{self, Event, KeyEventKind};
    use std::time::Duration;

    loop {
        terminal.draw(|frame| {
            super::ui::draw(frame, app);
        })?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key.code);
                }
            }
        }

        if app.running {
            app.tick();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}
