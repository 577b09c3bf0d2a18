//! Read a CIF file and print it back in canonical form.

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use cif_io::{NullPolicy, ParseError, ReadOptions, WriteError};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cif-fmt")]
#[command(about = "Validate and reformat CIF 1.1 files")]
struct Args {
    /// CIF file to read (stdin if omitted)
    file: Option<PathBuf>,

    /// Only check that the input parses; print nothing on success
    #[arg(long)]
    check: bool,

    /// Keep `.` and `?` in numeric table columns instead of reading them as 0
    #[arg(long)]
    keep_nulls: bool,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{path}: {source}")]
    Open { path: PathBuf, source: io::Error },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Write(#[from] WriteError),
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn run(args: &Args) -> Result<(), CliError> {
    let policy = if args.keep_nulls {
        NullPolicy::KeepAsString
    } else {
        NullPolicy::Zero
    };
    let options = ReadOptions::new().null_policy(policy);

    let doc = match &args.file {
        Some(path) => {
            let file = File::open(path).map_err(|source| CliError::Open {
                path: path.clone(),
                source,
            })?;
            cif_io::read_from_with(file, &options)?
        }
        None => cif_io::read_from_with(io::stdin().lock(), &options)?,
    };
    info!(blocks = doc.blocks.len(), "input is valid CIF");

    if args.check {
        return Ok(());
    }
    let stdout = io::stdout().lock();
    doc.write_to(stdout)?;
    io::stdout().flush().map_err(WriteError::from)?;
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("cif-fmt: {e}");
            ExitCode::FAILURE
        }
    }
}
