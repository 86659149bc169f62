//! stackmc - CLI Entry Point
//!
//! Commands:
//! - `stackmc-emu run <program>` - Run a compiled program
//! - `stackmc-emu debug <program>` - Interactive microcode stepper
//! - `stackmc-emu disasm <program>` - Print a program listing

use std::fs::OpenOptions;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use slog::{o, Drain, Level, LevelFilter, Logger};
use slog_async::OverflowStrategy;
use slog_term::{FullFormat, PlainDecorator, TermDecorator};

use stackmc::{load_program, simulate, MachineConfig, Program, Termination};

#[derive(Parser)]
#[command(name = "stackmc-emu")]
#[command(author = "Yigit")]
#[command(version = "0.1.0")]
#[command(about = "An emulator of a microcoded stack machine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it halts
    Run {
        /// Path to the compiled program (JSON)
        program: PathBuf,
        /// File whose contents feed READ
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Maximum number of instructions to execute
        #[arg(short, long)]
        limit: Option<u64>,
        /// Machine configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Write the log to a file instead of stderr
        #[arg(long)]
        log: Option<PathBuf>,
        /// Log every tick
        #[arg(short, long)]
        verbose: bool,
    },
    /// Step through a program in the terminal debugger
    #[cfg(feature = "tui")]
    Debug {
        program: PathBuf,
        #[arg(short, long)]
        input: Option<PathBuf>,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print a program listing
    Disasm { program: PathBuf },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            program,
            input,
            limit,
            config,
            log,
            verbose,
        } => run_program(&program, input, limit, config, log, verbose),
        #[cfg(feature = "tui")]
        Commands::Debug {
            program,
            input,
            config,
        } => debug_program(&program, input, config),
        Commands::Disasm { program } => disassemble_file(&program),
    };

    if let Err(message) = result {
        eprintln!("❌ {}", message);
        std::process::exit(1);
    }
}

fn run_program(
    path: &PathBuf,
    input: Option<PathBuf>,
    limit: Option<u64>,
    config: Option<PathBuf>,
    log: Option<PathBuf>,
    verbose: bool,
) -> Result<(), String> {
    let program = read_program(path)?;
    let input = read_input(input)?;
    let mut config = read_config(config)?;
    if let Some(limit) = limit {
        config.instruction_limit = limit;
    }
    let logger = build_logger(log, verbose)?;

    // The logger moves into the run and is dropped with it, flushing the
    // async drain before anything is printed.
    let result = simulate(&program, &input, &config, Some(logger));

    match result {
        Ok(report) => {
            println!("{}", report.output_text());
            println!("instructions: {}", report.instructions);
            println!("ticks: {}", report.ticks);
            if report.termination == Termination::InstructionLimit {
                println!();
                println!(
                    "⚠️  Reached instruction limit ({}). Use --limit to increase.",
                    config.instruction_limit
                );
            }
            Ok(())
        }
        Err(e) => {
            println!("{}", e.report.output_text());
            println!("instructions: {}", e.report.instructions);
            println!("ticks: {}", e.report.ticks);
            Err(format!("Machine fault: {}", e.source))
        }
    }
}

#[cfg(feature = "tui")]
fn debug_program(path: &PathBuf, input: Option<PathBuf>, config: Option<PathBuf>) -> Result<(), String> {
    let program = read_program(path)?;
    let input = read_input(input)?;
    let config = read_config(config)?;

    println!("🔍 Loaded {} instructions", program.len());

    stackmc::run_debugger(program, &input, config).map_err(|e| format!("Debugger error: {}", e))
}

fn disassemble_file(path: &PathBuf) -> Result<(), String> {
    let program = read_program(path)?;
    print!("{}", stackmc::program::disassemble(&program));
    Ok(())
}

fn read_program(path: &PathBuf) -> Result<Program, String> {
    load_program(path).map_err(|e| format!("Failed to load {}: {}", path.display(), e))
}

fn read_input(path: Option<PathBuf>) -> Result<String, String> {
    match path {
        Some(path) => std::fs::read_to_string(&path)
            .map(|text| text.trim().to_string())
            .map_err(|e| format!("Failed to read input {}: {}", path.display(), e)),
        None => Ok(String::new()),
    }
}

fn read_config(path: Option<PathBuf>) -> Result<MachineConfig, String> {
    match path {
        Some(path) => MachineConfig::load(&path)
            .map_err(|e| format!("Failed to load config {}: {}", path.display(), e)),
        None => Ok(MachineConfig::default()),
    }
}

/// Warnings to stderr by default; `--log` redirects to a file, `-v` adds
/// the per-tick trace.
fn build_logger(log: Option<PathBuf>, verbose: bool) -> Result<Logger, String> {
    let level = match (verbose, log.is_some()) {
        (true, _) => Level::Trace,
        (false, true) => Level::Debug,
        (false, false) => Level::Warning,
    };

    match log {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&path)
                .map_err(|e| format!("Failed to open log {}: {}", path.display(), e))?;
            let decorator = PlainDecorator::new(file);
            Ok(finish_logger(FullFormat::new(decorator).build().fuse(), level))
        }
        None => {
            let decorator = TermDecorator::new().stderr().build();
            Ok(finish_logger(FullFormat::new(decorator).build().fuse(), level))
        }
    }
}

fn finish_logger<D>(drain: D, level: Level) -> Logger
where
    D: Drain<Ok = (), Err = slog::Never> + Send + 'static,
{
    let drain = LevelFilter::new(drain, level).ignore_res();
    let drain = slog_async::Async::new(drain)
        .chan_size(4096)
        .overflow_strategy(OverflowStrategy::Block)
        .build()
        .fuse();
    Logger::root(drain, o!())
}
