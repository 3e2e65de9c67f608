//! Command-line front end.

pub mod args;
pub mod output;

pub use args::Cli;
pub use output::Output;

use crate::config::Config;
use crate::error::{Result, exit_code};
use crate::pipeline;

/// Load configuration, convert, print the summary. Returns the exit code.
pub fn run(cli: &Cli, output: &Output) -> Result<i32> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    cli.apply(&mut config);
    config.validate()?;

    let summary = pipeline::convert(&cli.input, &cli.output, &config)?;
    output.print(&summary)?;

    Ok(exit_code::SUCCESS)
}
