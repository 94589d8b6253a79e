use std::io::{self, Read};
use std::process::ExitCode;

use clap::Parser as ClapParser;

use bc_core::cli::Cli;
use bc_core::diagnostics::Diagnostics;
use bc_core::driver;

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(cli.tracing_filter()))
        .without_time()
        .init();

    let source = match &cli.file {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                let mut diagnostics = Diagnostics::stderr();
                diagnostics.report(format!("\ncould not read {}: {e}\n", path.display()));
                return ExitCode::from(74);
            }
        },
        None => {
            let mut buf = String::new();
            if let Err(e) = io::stdin().read_to_string(&mut buf) {
                let mut diagnostics = Diagnostics::stderr();
                diagnostics.report(format!("\ncould not read standard input: {e}\n"));
                return ExitCode::from(74);
            }
            buf
        }
    };

    let status = driver::run(&source, io::stdout(), io::stderr());
    ExitCode::from(status as u8)
}
