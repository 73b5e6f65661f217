//! Benchmark harness executable for nmbench.

use anyhow::Result;
use clap::Parser;
use nmbench_compiler::cli::{run_cli, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();
    run_cli(cli)
}
