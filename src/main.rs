//! Prints the symmetry report for a space group.
//!
//! Usage: `symexplore [SYMBOL] [CONVENTION] [OPERATIONS...]`, where the convention is `A1983`,
//! `I1952` or `Hall`, and each further argument is a triplet or a SHELX card.

use std::process::ExitCode;

use symexplore::{
    explore::{ExploreInput, Exploration},
    symbols::Convention,
};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()))
        .init();

    let mut args = std::env::args().skip(1);
    let symbol = args.next().unwrap_or_else(|| "P 21/c".to_string());
    let convention = match args.next().map(|c| c.parse::<Convention>()).transpose() {
        Ok(c) => c.unwrap_or_default(),
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let operations = args.collect::<Vec<_>>().join("\n");

    let exploration = ExploreInput::new(symbol, convention)
        .with_operations(&operations)
        .map_err(Into::into)
        .and_then(Exploration::new);
    match exploration {
        Ok(e) => {
            print!("{e}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
