use clap::Parser;
use fastsort::cli::{Cli, run};
use fastsort::output::OutputFormatter;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        OutputFormatter::error(&format!("Error: {}", e));
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
