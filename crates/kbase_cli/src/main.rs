//! kbase - rule engine command line
//!
//! Runs forward and backward chaining over knowledge-base files.

use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use kbase_cli::{run, Cli};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let status = run(&cli, &mut out);
    let _ = out.flush();

    match status {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
