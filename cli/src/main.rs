//! Entry-point for the `bashbros` binary.
//!
//! Usage errors exit 1; everything else maps through
//! [`bashbros_cli::run_main`] (0 allowed, 2 denied, 3 internal error).

use std::process::ExitCode;

use bashbros_cli::Cli;
use bashbros_cli::EXIT_USAGE;
use bashbros_cli::run_main;
use clap::Parser;

fn main() -> ExitCode {
    match Cli::try_parse() {
        Ok(cli) => ExitCode::from(run_main(cli)),
        Err(err) => {
            // Keep clap's rendering (help/version go to stdout, errors to
            // stderr) but own the exit code: 1 is reserved for usage.
            if err.use_stderr() {
                let _ = err.print();
                ExitCode::from(EXIT_USAGE)
            } else {
                let _ = err.print();
                ExitCode::SUCCESS
            }
        }
    }
}
