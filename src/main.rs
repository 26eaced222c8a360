use clap::Parser;
use std::process::ExitCode;
use tidywatch::cli::{Cli, run_cli};
use tidywatch::logging::{LogOptions, LogSink, build_dispatch};
use tidywatch::output::OutputFormatter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let options = LogOptions {
        log_file: cli.log_file.clone(),
    };
    let log = match build_dispatch(&options) {
        Ok(dispatch) => LogSink::new(dispatch),
        Err(e) => {
            OutputFormatter::error(&format!("Permission denied to log file: {}", e));
            return ExitCode::FAILURE;
        }
    };

    match run_cli(cli.command.unwrap_or_default(), &cli.config, log) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            OutputFormatter::error(&e);
            ExitCode::FAILURE
        }
    }
}
