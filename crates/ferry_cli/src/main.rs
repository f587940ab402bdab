//! `ferry`: convert, discover, drop and plan resources from the shell.

mod cli;

use clap::Parser;
use cli::Cli;
use ferry_convert::EngineError;
use ferry_remote::SshConnector;
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

/// `EX_TEMPFAIL`: the failure was transient and the command may be retried.
const EXIT_TRANSIENT: u8 = 75;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let engine = cli.engine(Arc::new(SshConnector::new()));
    let result = cli.command.run(&engine, &mut io::stdout().lock());
    engine.shutdown();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(error = ?err, "command failed");
            let _ = writeln!(io::stderr().lock(), "error: {err:#}");
            let transient = err
                .downcast_ref::<EngineError>()
                .is_some_and(EngineError::is_transient);
            if transient {
                ExitCode::from(EXIT_TRANSIENT)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
