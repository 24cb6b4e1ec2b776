mod commands;
mod helpers;

use clap::Parser;
use hafx_core::domain::HafxError;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info";

pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match run(args) {
        Ok(code) => code,
        Err(error) => {
            let hafx_error = error.as_hafx_error();
            eprintln!("{}", hafx_error.diagnostic_line());
            eprintln!("{}", hafx_error.fatal_exit_line());
            hafx_error.exit_code()
        }
    }
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once("hafx-sim".to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();
    parse_and_dispatch(full_args)
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => {
            init_logging(cli.log_level.as_deref())?;
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

/// `--log-level` wins over `RUST_LOG`; both fall back to `info`.
fn init_logging(log_level: Option<&str>) -> Result<(), CliError> {
    let filter = match log_level {
        Some(directive) => EnvFilter::try_new(directive).map_err(|error| {
            CliError::Usage(format!("invalid --log-level '{directive}': {error}"))
        })?,
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
    };

    // A subscriber may already be installed when `run` is called repeatedly
    // in one process; the first one stays.
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
    Ok(())
}

#[derive(Parser)]
#[command(name = "hafx-sim", about = "HaFX detector response simulation")]
struct Cli {
    /// Log filter directive, e.g. `debug` or `hafx_core=trace`
    #[arg(long, global = true, value_name = "FILTER")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Simulate one response record per absorber thickness
    Simulate(commands::SimulateArgs),
    /// Print the effective area stored in a record
    Area(commands::AreaArgs),
    /// Summarise a saved record
    Inspect(commands::InspectArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Simulate(args) => commands::run_simulate_command(args),
        CliCommand::Area(args) => commands::run_area_command(args),
        CliCommand::Inspect(args) => commands::run_inspect_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(HafxError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CliError {
    fn as_hafx_error(&self) -> HafxError {
        match self {
            Self::Usage(message) => HafxError::invalid_input("INPUT.CLI_USAGE", message.clone()),
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => HafxError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CliError, run};
    use hafx_core::domain::HafxError;

    #[test]
    fn unknown_subcommand_is_a_usage_error() {
        let error = run(["calibrate"]).expect_err("unknown subcommand");
        assert!(matches!(error, CliError::Usage(_)));
        assert_eq!(error.as_hafx_error().exit_code(), 2);
    }

    #[test]
    fn help_exits_cleanly() {
        assert_eq!(run(["--help"]).expect("help should print"), 0);
    }

    #[test]
    fn compute_errors_keep_their_category() {
        let error = CliError::Compute(HafxError::not_simulated("RUN.NOT_SIMULATED", "not yet"));
        let mapped = error.as_hafx_error();
        assert_eq!(mapped.exit_code(), 4);
        assert_eq!(mapped.diagnostic_line(), "ERROR: [RUN.NOT_SIMULATED] not yet");

        let error = CliError::from(anyhow::anyhow!("disk full"));
        assert_eq!(error.as_hafx_error().exit_code(), 3);
    }
}
