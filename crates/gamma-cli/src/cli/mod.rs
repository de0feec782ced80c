mod commands;
mod helpers;

use clap::Parser;
use gamma_core::domain::GammaError;

pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match run(args) {
        Ok(code) => code,
        Err(error) => {
            let gamma_error = error.as_gamma_error();
            eprintln!("{}", gamma_error.diagnostic_line());
            if let Some(summary_line) = gamma_error.fatal_exit_line() {
                eprintln!("{}", summary_line);
            }
            gamma_error.exit_code()
        }
    }
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once("phonon-gamma".to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();
    parse_and_dispatch(full_args)
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => {
            helpers::init_tracing(cli.verbose);
            dispatch_parsed(cli.command)
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

#[derive(Parser)]
#[command(
    name = "phonon-gamma",
    version,
    about = "Three-phonon scattering rates with resumable checkpoints"
)]
struct Cli {
    /// Log per-mode progress (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Compute scattering rates, resuming from existing checkpoint logs
    Gamma(commands::GammaArgs),
    /// Fill or read the occupation and heat-capacity caches
    Thermal(commands::ThermalArgs),
    /// Summarise a checkpoint log
    Checkpoint(commands::CheckpointArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Gamma(args) => commands::run_gamma_command(args),
        CliCommand::Thermal(args) => commands::run_thermal_command(args),
        CliCommand::Checkpoint(args) => commands::run_checkpoint_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(GammaError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<GammaError> for CliError {
    fn from(error: GammaError) -> Self {
        Self::Compute(error)
    }
}

impl CliError {
    fn as_gamma_error(&self) -> GammaError {
        match self {
            Self::Usage(message) => {
                GammaError::input_validation("INPUT.CLI_USAGE", message.clone())
            }
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => GammaError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}
