use std::{
    io::{self, Write},
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::Context;
use clap::Parser;
use log::LevelFilter;
use ls8_common::{ExecutionError, HostIO, NativeCpu, Program, ProgramError, RunMode};

#[derive(Parser)]
#[command(version, about = "Run an LS-8 program")]
struct Args {
    /// Program file: one binary literal per line, `#` starts a comment
    path: PathBuf,
    /// Log every executed instruction to stderr
    #[arg(short, long)]
    verbose: bool,
    /// Print a TRACE line with PC and registers before each instruction
    #[arg(short, long)]
    trace: bool,
    /// Dump registers, flags and memory once the run ends
    #[arg(short, long)]
    show_cpu_state: bool,
}

#[derive(Debug)]
struct StdoutHostIo;

impl HostIO for StdoutHostIo {
    fn print_number(&mut self, value: u8) -> Result<(), ExecutionError> {
        writeln!(io::stdout().lock(), "{value}")?;
        Ok(())
    }

    fn print_char(&mut self, value: u8) -> Result<(), ExecutionError> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(&[value])?;
        stdout.flush()?;
        Ok(())
    }
}

fn run(path: &Path, trace: bool, show_cpu_state: bool) -> anyhow::Result<()> {
    let program = Program::load(path)
        .with_context(|| format!("failed to load program {}", path.display()))?;

    let mut cpu = NativeCpu::new(StdoutHostIo);
    cpu.set_trace(trace);
    cpu.load_program(&program)?;

    let result = cpu.execute(RunMode::Run);

    if show_cpu_state {
        cpu.print_state();
    }

    let stats = result.context("execution aborted")?;
    log::debug!("executed {} instructions", stats.instructions);

    Ok(())
}

fn exit_code(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| {
            cause
                .downcast_ref::<ProgramError>()
                .map(ProgramError::exit_code)
                .or_else(|| {
                    cause
                        .downcast_ref::<ExecutionError>()
                        .map(ExecutionError::exit_code)
                })
        })
        .unwrap_or(1)
}

fn main() -> ExitCode {
    let Args {
        path,
        verbose,
        trace,
        show_cpu_state,
    } = Args::parse();

    env_logger::Builder::new()
        .filter_level(if verbose {
            LevelFilter::Trace
        } else {
            LevelFilter::Warn
        })
        .parse_default_env()
        .init();

    match run(&path, trace, show_cpu_state) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}
