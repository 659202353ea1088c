//! xbind
//!
//! Reads XML documents against a declarative model.

use std::process::ExitCode;

use clap::Parser;
use xbind_cli::{CliConfig, init_logging, run};

fn main() -> ExitCode {
    let config = CliConfig::parse();
    init_logging(&config.log_level);

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        return ExitCode::FAILURE;
    }

    match run(&config) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
