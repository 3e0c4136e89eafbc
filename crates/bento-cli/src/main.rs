//! Entry point of the `bento` binary.

use std::process::ExitCode;

use bento_cli::{CliError, cli, commands, error, logger};
use clap::Parser;

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::Cli::parse();

    let color = logger::should_use_colors(args.no_color);
    logger::init_logger(args.verbose, args.quiet, !color);

    match commands::build_execute(&args.build, color).await {
        Ok(()) => ExitCode::SUCCESS,
        // Already reported by the build logger.
        Err(CliError::Failed(code)) => exit(code),
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", error::cli_error_to_miette(err));
            exit(code)
        }
    }
}

fn exit(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
