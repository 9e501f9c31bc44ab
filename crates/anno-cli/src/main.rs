use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, Subcommand};

use anno::Error;
use anno_gen::{clean_dir, generate_dir};

#[derive(Parser, Debug)]
#[command(
    name = "anno",
    about = "anno: derive named error constructors from annotated call sites",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan a source tree, generate error declarations and rewrite call sites
    Gen {
        /// Root directory to scan recursively
        #[arg(value_name = "DIR", default_value = ".")]
        dir: PathBuf,
    },
    /// Remove every generated declarations file under a directory
    Clean {
        /// Root directory to scan recursively
        #[arg(value_name = "DIR", default_value = ".")]
        dir: PathBuf,
    },
}

fn run(args: Cli) -> Result<(), Error> {
    let total_start = Instant::now();

    // Initialize tracing subscriber for logging
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    }

    match args.command {
        Command::Gen { dir } => {
            let report = generate_dir(&dir)?;
            eprintln!(
                "generated {} kinds, rewrote {} call sites across {} modules",
                report.kinds, report.rewrites, report.modules
            );
        }
        Command::Clean { dir } => {
            let removed = clean_dir(&dir)?;
            eprintln!("removed {removed} generated files");
        }
    }

    let total_secs = total_start.elapsed().as_secs_f64();
    tracing::info!(total_secs, "complete");
    Ok(())
}

fn main() -> ExitCode {
    let args = Cli::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", err.strace());
            ExitCode::FAILURE
        }
    }
}
