//! Evermark CLI entry point.

use clap::Parser;
use evermark::cli::{self, Cli, Output};
use log::LevelFilter;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    let output = Output::new(cli.output_format(), cli.quiet);
    match cli::run(&cli, &output) {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            output.error(&e.to_string());
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

/// `-q` silences logging; otherwise `-v` raises the level and `RUST_LOG` refines it.
fn init_logging(cli: &Cli) {
    let level = if cli.quiet {
        LevelFilter::Off
    } else {
        match cli.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    if !cli.quiet {
        builder.parse_default_env();
    }
    builder.init();
}
