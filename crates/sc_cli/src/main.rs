use std::process::ExitCode;

use clap::Parser;
use sc_cli::app;
use sc_cli::cli::Cli;
use sc_term::{logging, EnvConfig};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let env = EnvConfig::from_env();

    if let Err(error) = logging::init(&env) {
        eprintln!("sc: failed to open log file: {error}");
        return ExitCode::FAILURE;
    }

    match app::run(cli, &env) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("sc: {error}");
            ExitCode::FAILURE
        }
    }
}
