use super::CliError;
use super::helpers::{init_logging, install_interrupt_handler, load_harness_config};
use anyhow::Context;
use oraclecheck_core::common::config::check_configuration;
use oraclecheck_core::domain::HarnessError;
use oraclecheck_core::modules::comparator::OracleComparator;
use oraclecheck_core::modules::report::{RunReport, render_human_summary, write_report_file};
use oraclecheck_core::modules::runner::{HarnessRunner, OraclePolicy, RunOptions, default_jobs};
use oraclecheck_core::modules::store::{FixtureStore, ProjectFilter};
use std::io::Write;
use std::num::NonZeroUsize;
use std::path::PathBuf;

#[derive(clap::Args)]
pub(super) struct RunArgs {
    /// Fixture root holding `<project>-<commitHash>` directories
    #[arg(long)]
    root: PathBuf,

    /// Only run projects matching this glob
    #[arg(long)]
    project: Option<String>,

    /// Checker name, as defined in the configuration file
    #[arg(long)]
    checker: String,

    /// Checker attribute as key=value; repeatable
    #[arg(long = "attr", value_name = "KEY=VALUE")]
    attributes: Vec<String>,

    /// Harness configuration file [default: ./oraclecheck.json when present]
    #[arg(long)]
    config: Option<PathBuf>,

    /// Message catalog, overriding the configuration file
    #[arg(long)]
    messages: Option<PathBuf>,

    /// Read oracles from this tree instead of next to each fixture
    #[arg(long)]
    oracle_root: Option<PathBuf>,

    /// Worker threads [default: available parallelism]
    #[arg(long)]
    jobs: Option<NonZeroUsize>,

    /// Skip fixtures without an oracle instead of failing them
    #[arg(long)]
    allow_missing_oracle: bool,

    /// Fail fixtures whose diagnostics are reported in a different order than recorded
    #[arg(long)]
    strict_order: bool,

    /// JSON report output path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(clap::Args)]
pub(super) struct ListArgs {
    /// Fixture root holding `<project>-<commitHash>` directories
    #[arg(long)]
    root: PathBuf,

    /// Only list projects matching this glob
    #[arg(long)]
    project: Option<String>,

    /// Debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

impl RunArgs {
    fn run_options(&self) -> RunOptions {
        RunOptions {
            jobs: self.jobs.map_or_else(default_jobs, NonZeroUsize::get),
            oracle_policy: if self.allow_missing_oracle {
                OraclePolicy::Optional
            } else {
                OraclePolicy::Required
            },
            strict_order: self.strict_order,
        }
    }
}

pub(super) fn run_oracle_command(args: RunArgs) -> Result<i32, CliError> {
    init_logging(args.verbose);

    let mut config = load_harness_config(args.config.as_deref())?;
    if let Some(messages) = &args.messages {
        config.messages = Some(messages.clone());
    }
    if let Some(oracle_root) = &args.oracle_root {
        config.oracle_root = Some(oracle_root.clone());
    }

    let check_config = check_configuration(&args.checker, &args.attributes)?;
    let filter = args
        .project
        .as_deref()
        .map(ProjectFilter::new)
        .transpose()?;
    let store = FixtureStore::open(&args.root)?.with_oracle_layout(config.oracle_layout());
    let registry = config.build_registry()?;
    let comparator = OracleComparator::new(config.message_catalog()?);
    let options = args.run_options();

    let runner = HarnessRunner::new(store, registry)
        .with_comparator(comparator)
        .with_options(options.clone())
        .with_span(tracing::info_span!("oraclecheck", command = "run"));
    install_interrupt_handler(runner.cancellation());
    let outcome = runner.run_listed(filter.as_ref(), &check_config)?;

    let report = RunReport::new(
        &args.root,
        &check_config,
        options.oracle_policy,
        options.strict_order,
        outcome,
    );
    println!("{}", render_human_summary(&report));

    if let Some(report_path) = &args.report {
        write_report_file(report_path, &report).map_err(HarnessError::from)?;
    }
    Ok(report.exit_code())
}

pub(super) fn run_list_command(args: ListArgs) -> Result<i32, CliError> {
    init_logging(args.verbose);

    let filter = args
        .project
        .as_deref()
        .map(ProjectFilter::new)
        .transpose()?;
    let store = FixtureStore::open(&args.root)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for identity in store.list_fixtures(filter.as_ref()) {
        writeln!(
            out,
            "{} {} {}",
            identity.project, identity.commit_hash, identity.relative_path
        )
        .context("failed to write fixture listing")?;
    }
    out.flush().context("failed to flush fixture listing")?;
    Ok(0)
}
