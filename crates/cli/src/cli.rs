//! Command-line interface definitions.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "breeze",
    version,
    about = "Compile Breeze programs to Go and run them",
    long_about = None
)]
pub struct Cli {
    /// Breeze source file to compile
    pub file: PathBuf,

    /// Output directory for the generated Go project
    /// (defaults to <stem>_out beside the source file)
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Generate Go sources without building or running them
    #[arg(long)]
    pub emit_only: bool,

    /// Print pipeline progress and all semantic diagnostics
    #[arg(short, long)]
    pub verbose: bool,
}
