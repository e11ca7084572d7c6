use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

/// Runs a COIL binary to completion.
#[derive(Parser, Debug)]
#[command(name = "coilvm", version, about)]
struct Cli {
    /// COIL program to execute.
    input: PathBuf,

    /// Binary input is the only supported mode; accepted for symmetry with
    /// `hoil2coil`'s own `-b` flag.
    #[arg(short = 'b', long)]
    binary: bool,

    /// Print execution statistics to stderr after halt.
    #[arg(short = 's', long)]
    stats: bool,
}

fn main() -> Result<ExitCode> {
    env_logger::init();
    let cli = Cli::parse();
    let _ = cli.binary;

    let bytes =
        fs::read(&cli.input).with_context(|| format!("reading {}", cli.input.display()))?;

    let mut vm = coil::vm::Vm::load(&bytes)
        .with_context(|| format!("loading {}", cli.input.display()))?;
    info!("loaded {}", cli.input.display());

    let exit_code = match vm.run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("coilvm: {}", err);
            return Ok(ExitCode::FAILURE);
        }
    };

    if cli.stats {
        let stats = vm.stats();
        eprintln!(
            "instructions executed: {}\nmax stack bytes: {}\nmax call depth: {}\nheap allocations: {}\nheap frees: {}",
            stats.instructions_executed,
            stats.max_stack_bytes,
            stats.max_call_depth,
            stats.heap_allocations,
            stats.heap_frees,
        );
    }

    Ok(exit_code_to_process_code(exit_code))
}

fn exit_code_to_process_code(code: i64) -> ExitCode {
    ExitCode::from((code & 0xFF) as u8)
}
