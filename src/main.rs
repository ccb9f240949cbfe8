use anyhow::Result;
use clap::Parser;
use fabqc::cli::{Cli, run};

fn main() -> Result<()> {
    let cli = Cli::parse();
    run(cli)?;
    Ok(())
}
