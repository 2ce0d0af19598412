use clap::{Args, Subcommand};
use std::path::PathBuf;

use sertel_pipeline::Config;

use crate::exit::{config_error, CliResult};
use crate::output::OutputFormat;

pub mod check;
pub mod decode;
pub mod run;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Acquire, log and export until interrupted.
    Run(RunArgs),
    /// Validate a configuration file and print a summary.
    Check(CheckArgs),
    /// Replay a captured byte stream through the framer and decoder.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Check(args) => check::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

fn load_config(path: &std::path::Path) -> CliResult<Config> {
    Config::load(path).map_err(|err| config_error("cannot load configuration", err))
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Configuration file.
    #[arg(long, short = 'c', value_name = "FILE", env = "SERTEL_CONFIG")]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Configuration file.
    #[arg(long, short = 'c', value_name = "FILE", env = "SERTEL_CONFIG")]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Configuration file supplying frame layout and calibration.
    #[arg(long, short = 'c', value_name = "FILE", env = "SERTEL_CONFIG")]
    pub config: PathBuf,
    /// Stream whose calibration to apply.
    #[arg(long, short = 's')]
    pub stream: String,
    /// Captured raw bytes.
    pub capture: PathBuf,
    /// Print raw readings without calibration.
    #[arg(long)]
    pub raw: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
