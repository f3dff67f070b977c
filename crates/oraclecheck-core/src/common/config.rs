//! Harness configuration file and command-line attribute parsing.
//!
//! The configuration file is JSON with camelCase keys:
//!
//! ```json
//! {
//!   "checkers": [
//!     { "name": "checkstyle", "command": "./tools/checkstyle.sh", "args": ["--json"],
//!       "env": { "JAVA_OPTS": "-Xmx1g" }, "ascendingLines": true }
//!   ],
//!   "messages": "messages.json",
//!   "oracleRoot": "oracles"
//! }
//! ```
//!
//! Relative paths are resolved against the directory holding the file.

use crate::domain::{CheckConfiguration, HarnessError, HarnessResult};
use crate::modules::catalog::{CatalogError, KeyCatalog, MessageCatalog, TemplateCatalog};
use crate::modules::checker::{CheckerRegistry, ExternalCommandChecker};
use crate::modules::store::OracleLayout;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DEFAULT_CONFIG_FILE: &str = "oraclecheck.json";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HarnessConfig {
    #[serde(default)]
    pub checkers: Vec<CheckerDefinition>,
    #[serde(default)]
    pub messages: Option<PathBuf>,
    #[serde(default)]
    pub oracle_root: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CheckerDefinition {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    #[serde(default)]
    pub ascending_lines: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse configuration '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("checker '{0}' is defined more than once")]
    DuplicateChecker(String),
    #[error("checker definition #{0} has an empty name")]
    UnnamedChecker(usize),
    #[error("attribute '{0}' is not of the form key=value")]
    MalformedAttribute(String),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl From<ConfigError> for HarnessError {
    fn from(error: ConfigError) -> Self {
        let message = error.to_string();
        match error {
            ConfigError::Read { .. } | ConfigError::Catalog(CatalogError::Read { .. }) => {
                HarnessError::io_system("IO.CONFIG", message)
            }
            ConfigError::Parse { .. }
            | ConfigError::DuplicateChecker(_)
            | ConfigError::UnnamedChecker(_)
            | ConfigError::Catalog(CatalogError::Parse { .. }) => {
                HarnessError::input_validation("INPUT.CONFIG", message)
            }
            ConfigError::MalformedAttribute(_) => {
                HarnessError::input_validation("INPUT.CHECK_ATTRIBUTE", message)
            }
        }
    }
}

impl HarnessConfig {
    pub fn load(path: impl AsRef<Path>) -> HarnessResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        Self::parse(&content, path, base_dir).map_err(HarnessError::from)
    }

    pub fn from_json(json: &str, base_dir: impl AsRef<Path>) -> HarnessResult<Self> {
        Self::parse(json, Path::new("<inline-config>"), base_dir.as_ref())
            .map_err(HarnessError::from)
    }

    fn parse(json: &str, path: &Path, base_dir: &Path) -> Result<Self, ConfigError> {
        let mut config: Self = serde_json::from_str(json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        config.messages = config
            .messages
            .map(|messages| resolve_against(base_dir, &messages));
        config.oracle_root = config
            .oracle_root
            .map(|oracle_root| resolve_against(base_dir, &oracle_root));
        for checker in &mut config.checkers {
            checker.working_dir = checker
                .working_dir
                .as_ref()
                .map(|working_dir| resolve_against(base_dir, working_dir));
            if looks_like_relative_path(&checker.command) {
                checker.command = resolve_against(base_dir, Path::new(&checker.command))
                    .to_string_lossy()
                    .into_owned();
            }
        }
        Ok(config)
    }

    pub fn build_registry(&self) -> HarnessResult<CheckerRegistry> {
        let mut registry = CheckerRegistry::new();
        for (index, definition) in self.checkers.iter().enumerate() {
            if definition.name.trim().is_empty() {
                return Err(ConfigError::UnnamedChecker(index + 1).into());
            }
            let mut checker = ExternalCommandChecker::new(&definition.name, &definition.command)
                .with_args(definition.args.iter().cloned())
                .with_ascending_lines(definition.ascending_lines);
            for (key, value) in &definition.env {
                checker = checker.with_env(key, value);
            }
            if let Some(working_dir) = &definition.working_dir {
                checker = checker.with_working_dir(working_dir.clone());
            }
            if registry.register(Arc::new(checker)).is_some() {
                return Err(ConfigError::DuplicateChecker(definition.name.clone()).into());
            }
        }
        Ok(registry)
    }

    /// Templates from `messages` when set, otherwise the key itself is the message.
    pub fn message_catalog(&self) -> HarnessResult<Arc<dyn MessageCatalog>> {
        match &self.messages {
            Some(path) => {
                let catalog = TemplateCatalog::from_path(path).map_err(ConfigError::from)?;
                Ok(Arc::new(catalog))
            }
            None => Ok(Arc::new(KeyCatalog)),
        }
    }

    pub fn oracle_layout(&self) -> OracleLayout {
        self.oracle_root
            .clone()
            .map_or(OracleLayout::Sidecar, OracleLayout::Tree)
    }
}

/// Splits `key=value`. The value may contain further `=` and may be empty; the key may not.
pub fn parse_attribute(raw: &str) -> HarnessResult<(String, String)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(ConfigError::MalformedAttribute(raw.to_string()).into()),
    }
}

pub fn check_configuration<I, S>(
    checker_name: &str,
    attributes: I,
) -> HarnessResult<CheckConfiguration>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut config = CheckConfiguration::new(checker_name);
    for raw in attributes {
        let (key, value) = parse_attribute(raw.as_ref())?;
        config.attributes.insert(key, value);
    }
    Ok(config)
}

fn resolve_against(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

fn looks_like_relative_path(command: &str) -> bool {
    command.contains(['/', '\\']) && !Path::new(command).is_absolute()
}
