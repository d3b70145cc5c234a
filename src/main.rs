//! `sra` binary entrypoint.

use clap::Parser;

use storage_relief_agent::cli_app::{Cli, run};

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(&cli) {
        eprintln!("sra: {err}");
        std::process::exit(err.exit_code());
    }
}
