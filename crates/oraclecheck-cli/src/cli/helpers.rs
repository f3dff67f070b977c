use super::CliError;
use anyhow::Context;
use oraclecheck_core::common::config::{DEFAULT_CONFIG_FILE, HarnessConfig};
use oraclecheck_core::modules::runner::CancellationToken;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Installs the stderr subscriber. `RUST_LOG` wins over the verbosity flag.
pub(super) fn init_logging(verbose: bool) {
    let default_directive = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    // A second install in the same process keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .try_init();
}

/// An explicit `--config` must exist; the default file is read only when present.
pub(super) fn load_harness_config(explicit: Option<&Path>) -> Result<HarnessConfig, CliError> {
    if let Some(path) = explicit {
        return Ok(HarnessConfig::load(path)?);
    }

    let default_path = default_config_path()?;
    if default_path.is_file() {
        tracing::debug!(path = %default_path.display(), "loading default configuration");
        Ok(HarnessConfig::load(&default_path)?)
    } else {
        Ok(HarnessConfig::default())
    }
}

fn default_config_path() -> Result<PathBuf, CliError> {
    let working_dir =
        std::env::current_dir().context("failed to read current working directory")?;
    Ok(working_dir.join(DEFAULT_CONFIG_FILE))
}

pub(super) fn install_interrupt_handler(token: CancellationToken) {
    if let Err(error) = ctrlc::set_handler(move || token.cancel()) {
        tracing::warn!(%error, "failed to install interrupt handler; Ctrl+C will abort the run");
    }
}
