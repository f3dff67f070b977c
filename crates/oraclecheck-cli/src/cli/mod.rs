mod commands;
mod helpers;

use clap::Parser;
use oraclecheck_core::domain::HarnessError;

pub fn run_from_env() -> i32 {
    let args = std::env::args().skip(1).collect::<Vec<_>>();

    match run(args) {
        Ok(code) => code,
        Err(error) => {
            let harness_error = error.as_harness_error();
            eprintln!("{}", harness_error.diagnostic_line());
            eprintln!("{}", harness_error.fatal_exit_line());
            harness_error.exit_code()
        }
    }
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once("oraclecheck".to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();
    parse_and_dispatch(full_args)
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => dispatch_parsed(cli.command),
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
    name = "oraclecheck",
    version,
    about = "Commit-scoped fixture and oracle regression harness"
)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Run a checker over fixtures and compare its diagnostics with the recorded oracles
    Run(commands::RunArgs),
    /// List the fixtures under a fixture root
    List(commands::ListArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Run(args) => commands::run_oracle_command(args),
        CliCommand::List(args) => commands::run_list_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Harness(#[from] HarnessError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CliError {
    fn as_harness_error(&self) -> HarnessError {
        match self {
            Self::Usage(message) => {
                HarnessError::input_validation("INPUT.CLI_USAGE", message.trim_end().to_string())
            }
            Self::Harness(error) => error.clone(),
            Self::Internal(error) => HarnessError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CliError, run};

    #[test]
    fn help_exits_successfully() {
        let code = run(["--help"]).expect("help should not be an error");
        assert_eq!(code, 0);
    }

    #[test]
    fn unknown_subcommand_is_a_usage_error() {
        let error = run(["frobnicate"]).expect_err("unknown subcommand should fail");
        assert!(matches!(error, CliError::Usage(_)));
        let harness_error = error.as_harness_error();
        assert_eq!(harness_error.placeholder(), "INPUT.CLI_USAGE");
        assert_eq!(harness_error.exit_code(), 2);
    }

    #[test]
    fn run_requires_root_and_checker() {
        let error = run(["run", "--checker", "indentation"])
            .expect_err("missing --root should fail");
        assert!(matches!(error, CliError::Usage(message) if message.contains("--root")));
    }

    #[test]
    fn zero_jobs_is_rejected() {
        let error = run(["run", "--root", ".", "--checker", "x", "--jobs", "0"])
            .expect_err("zero workers should fail");
        assert!(matches!(error, CliError::Usage(_)));
    }
}
