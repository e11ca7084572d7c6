use std::fs;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

/// Translates a HOIL source file into a COIL instruction stream.
#[derive(Parser, Debug)]
#[command(name = "hoil2coil", version, about)]
struct Cli {
    /// HOIL source file to assemble.
    input: PathBuf,

    /// Path to write the assembled output to.
    output: PathBuf,

    /// Write raw binary records instead of the default textual hex form.
    #[arg(short = 'b', long)]
    binary: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let source = fs::read_to_string(&cli.input)
        .with_context(|| format!("reading {}", cli.input.display()))?;

    let records = hoil::assemble(&source)
        .with_context(|| format!("assembling {}", cli.input.display()))?;
    info!("assembled {} record(s) from {}", records.len(), cli.input.display());

    let output_file = fs::File::create(&cli.output)
        .with_context(|| format!("creating {}", cli.output.display()))?;
    let mut writer = BufWriter::new(output_file);

    if cli.binary {
        hoil::write_binary(&records, &mut writer)
    } else {
        hoil::write_text(&records, &mut writer)
    }
    .with_context(|| format!("writing {}", cli.output.display()))?;

    Ok(())
}
