//! postgres-entrypoint binary
//!
//! Parses the command line, installs logging and hands off to the dispatcher.
//! Failures are logged once here and mapped to the process exit status.

use clap::Parser;
use common::init_logging;
use postgres_entrypoint::cli::{parse_error_exit_code, Cli};
use postgres_entrypoint::commands::dispatch;
use postgres_entrypoint::error::exit_code;
use std::process::ExitCode;
use tracing::error;

fn status(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return status(parse_error_exit_code(&e));
        }
    };

    let _guard = init_logging(cli.quiet);

    match dispatch(cli.command, cli.quiet).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            status(exit_code(&err))
        }
    }
}
