use clap::{Arg, ArgAction, Command};
use kiwi::error::KiwiError;
use kiwi::runner::{self, RunOptions};
use kiwi::source;
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    if let Ok(filter) = EnvFilter::try_from_env("KIWI_LOG") {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    }

    let matches = Command::new("kiwi")
        .about("An interpreter for the Kiwi language that reports every error it finds")
        .arg(
            Arg::new("file")
                .help("The source file to run; standard input is read when omitted")
                .value_name("FILE")
                .index(1),
        )
        .arg(
            Arg::new("tokens")
                .long("tokens")
                .help("Print the token stream instead of running the program")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("pretty")
                .long("pretty")
                .help("Render diagnostics as annotated source reports")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let path = matches.get_one::<String>("file");
    let options = RunOptions {
        dump_tokens: matches.get_flag("tokens"),
        pretty: matches.get_flag("pretty"),
    };

    let units = match read_input(path.map(Path::new)) {
        Ok(units) => units,
        Err(e) => {
            match path {
                Some(path) => eprintln!("Error reading '{}': {}", path, e),
                None => eprintln!("Error reading standard input: {}", e),
            }
            return ExitCode::FAILURE;
        }
    };

    match runner::run(units, path.map(String::as_str), &options) {
        Ok(diagnostics) if diagnostics.is_empty() => ExitCode::SUCCESS,
        Ok(diagnostics) => {
            tracing::debug!(count = diagnostics.len(), "run finished with diagnostics");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn read_input(path: Option<&Path>) -> Result<Vec<u16>, KiwiError> {
    let bytes = match path {
        Some(path) => fs::read(path)?,
        None => {
            let mut bytes = Vec::new();
            io::stdin().lock().read_to_end(&mut bytes)?;
            bytes
        }
    };
    source::decode(bytes)
}
