//! Entry point for the `breeze` binary.

mod cli;
mod gotool;
mod pipeline;

use clap::Parser;
use std::process;

fn main() {
    let cli = cli::Cli::parse();
    match pipeline::run(&cli) {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            process::exit(1);
        }
    }
}
