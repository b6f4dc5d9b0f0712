mod commands;
mod helpers;

use clap::Parser;
use spectro_core::domain::SpectroError;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

pub fn run_from_env() -> i32 {
    match parse_and_dispatch(std::env::args().collect()) {
        Ok(code) => code,
        Err(error) => {
            let spectro_error = error.as_spectro_error();
            eprintln!("{}", spectro_error.diagnostic_line());
            if let Some(summary_line) = spectro_error.fatal_exit_line() {
                eprintln!("{}", summary_line);
            }
            spectro_error.exit_code()
        }
    }
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => {
            init_tracing(cli.verbose);
            dispatch_parsed(cli.command, cli.config)
        }
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

/// Logs go to stderr so tables and paths on stdout stay scriptable.
fn init_tracing(verbose: bool) {
    let default_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser)]
#[command(name = "spectro", version, about = "Spectrometer frame processing")]
struct Cli {
    /// Processing configuration (JSON); built-in defaults when omitted
    #[arg(long, global = true, value_name = "path")]
    config: Option<PathBuf>,

    /// Emit debug diagnostics on stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Subtract a dark frame from a spectrum
    DarkCorrect(commands::DarkCorrectArgs),
    /// Differentiate a spectrum against its wavelength axis
    Derivative(commands::DerivativeArgs),
    /// Smooth a spectrum
    Smooth(commands::SmoothArgs),
    /// Estimate and remove an airPLS baseline
    Baseline(commands::BaselineArgs),
    /// Detect peaks and print the peak table
    Peaks(commands::PeaksArgs),
    /// Run baseline removal and peak detection as configured
    Process(commands::ProcessArgs),
    /// Acquire spectra from a configured device
    Acquire(commands::AcquireArgs),
}

fn dispatch_parsed(command: CliCommand, config: Option<PathBuf>) -> Result<i32, CliError> {
    let config = config.as_deref();
    match command {
        CliCommand::DarkCorrect(args) => commands::run_dark_correct_command(args, config),
        CliCommand::Derivative(args) => commands::run_derivative_command(args),
        CliCommand::Smooth(args) => commands::run_smooth_command(args),
        CliCommand::Baseline(args) => commands::run_baseline_command(args, config),
        CliCommand::Peaks(args) => commands::run_peaks_command(args, config),
        CliCommand::Process(args) => commands::run_process_command(args, config),
        CliCommand::Acquire(args) => commands::run_acquire_command(args, config),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(SpectroError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CliError {
    fn as_spectro_error(&self) -> SpectroError {
        match self {
            Self::Usage(message) => SpectroError::validation("INPUT.CLI_USAGE", message.clone()),
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => SpectroError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}
