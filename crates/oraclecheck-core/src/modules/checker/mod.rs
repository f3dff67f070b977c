mod command;

pub use command::ExternalCommandChecker;

use crate::domain::{
    CheckConfiguration, Diagnostic, FixtureIdentity, HarnessError, HarnessResult, SourceFixture,
};
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::Arc;

pub type CheckerCause = Box<dyn Error + Send + Sync + 'static>;

/// An external checking tool that turns source text into diagnostics.
///
/// Implementations return diagnostics in the order the tool emits them and
/// report tool-level problems as [`CheckerFailure`].
pub trait Checker: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the tool's output is meant to be ascending by line.
    fn emits_ascending_lines(&self) -> bool {
        false
    }

    fn run(
        &self,
        config: &CheckConfiguration,
        source: &SourceFixture,
    ) -> Result<Vec<Diagnostic>, CheckerFailure>;
}

#[derive(Debug, thiserror::Error)]
#[error("checker '{checker}' failed on '{identity}': {cause}")]
pub struct CheckerFailure {
    pub checker: String,
    pub identity: FixtureIdentity,
    #[source]
    pub cause: CheckerCause,
}

impl CheckerFailure {
    pub fn new(
        checker: impl Into<String>,
        identity: FixtureIdentity,
        cause: impl Into<CheckerCause>,
    ) -> Self {
        Self {
            checker: checker.into(),
            identity,
            cause: cause.into(),
        }
    }
}

/// The harness-side face of a [`Checker`].
///
/// Rejects non-positive line numbers and puts the output of ascending-line
/// tools into line order (stable, so same-line entries keep emission order).
#[derive(Clone)]
pub struct CheckerAdapter {
    checker: Arc<dyn Checker>,
}

impl std::fmt::Debug for CheckerAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckerAdapter")
            .field("checker", &self.checker.name())
            .finish()
    }
}

impl CheckerAdapter {
    pub fn new(checker: Arc<dyn Checker>) -> Self {
        Self { checker }
    }

    pub fn name(&self) -> &str {
        self.checker.name()
    }

    pub fn run(
        &self,
        config: &CheckConfiguration,
        source: &SourceFixture,
    ) -> Result<Vec<Diagnostic>, CheckerFailure> {
        let mut diagnostics = self.checker.run(config, source)?;

        if let Some(position) = diagnostics.iter().position(|diagnostic| diagnostic.line == 0) {
            return Err(CheckerFailure::new(
                self.checker.name(),
                source.identity.clone(),
                format!(
                    "diagnostic #{} ('{}') has line 0; lines are 1-based",
                    position + 1,
                    diagnostics[position].message_key
                ),
            ));
        }

        if self.checker.emits_ascending_lines() {
            diagnostics.sort_by_key(|diagnostic| diagnostic.line);
        }
        Ok(diagnostics)
    }
}

/// Checkers by name; `CheckConfiguration::checker_name` picks one per run.
#[derive(Default, Clone)]
pub struct CheckerRegistry {
    checkers: BTreeMap<String, Arc<dyn Checker>>,
}

impl std::fmt::Debug for CheckerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckerRegistry")
            .field("checkers", &self.checkers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CheckerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a checker, replacing any previous one with the same name.
    pub fn register(&mut self, checker: Arc<dyn Checker>) -> Option<Arc<dyn Checker>> {
        self.checkers.insert(checker.name().to_string(), checker)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Checker>> {
        self.checkers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.checkers.keys().map(String::as_str).collect()
    }

    pub fn select(&self, config: &CheckConfiguration) -> HarnessResult<CheckerAdapter> {
        self.get(&config.checker_name)
            .map(CheckerAdapter::new)
            .ok_or_else(|| {
                let known = if self.checkers.is_empty() {
                    "none configured".to_string()
                } else {
                    self.names().join(", ")
                };
                HarnessError::input_validation(
                    "INPUT.CHECKER_UNKNOWN",
                    format!(
                        "unknown checker '{}' (known: {})",
                        config.checker_name, known
                    ),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::{Checker, CheckerAdapter, CheckerFailure, CheckerRegistry};
    use crate::domain::{CheckConfiguration, Diagnostic, FixtureIdentity, SourceFixture};
    use std::sync::Arc;

    struct FixedChecker {
        name: &'static str,
        ascending: bool,
        diagnostics: Vec<Diagnostic>,
    }

    impl Checker for FixedChecker {
        fn name(&self) -> &str {
            self.name
        }

        fn emits_ascending_lines(&self) -> bool {
            self.ascending
        }

        fn run(
            &self,
            _config: &CheckConfiguration,
            _source: &SourceFixture,
        ) -> Result<Vec<Diagnostic>, CheckerFailure> {
            Ok(self.diagnostics.clone())
        }
    }

    fn source() -> SourceFixture {
        SourceFixture::new(FixtureIdentity::new("demo", "abcdef0", "A.java"), "class A {}")
    }

    #[test]
    fn ascending_checkers_are_put_in_line_order() {
        let checker = FixedChecker {
            name: "sorted",
            ascending: true,
            diagnostics: vec![
                Diagnostic::new(9, "late"),
                Diagnostic::new(2, "first"),
                Diagnostic::new(2, "second"),
            ],
        };
        let adapter = CheckerAdapter::new(Arc::new(checker));
        let diagnostics = adapter
            .run(&CheckConfiguration::new("sorted"), &source())
            .expect("checker should run");
        let keys = diagnostics
            .iter()
            .map(|diagnostic| diagnostic.message_key.as_str())
            .collect::<Vec<_>>();
        assert_eq!(keys, vec!["first", "second", "late"]);
    }

    #[test]
    fn emission_order_is_kept_for_other_checkers() {
        let checker = FixedChecker {
            name: "raw",
            ascending: false,
            diagnostics: vec![Diagnostic::new(9, "late"), Diagnostic::new(2, "early")],
        };
        let adapter = CheckerAdapter::new(Arc::new(checker));
        let diagnostics = adapter
            .run(&CheckConfiguration::new("raw"), &source())
            .expect("checker should run");
        assert_eq!(diagnostics[0].line, 9);
        assert_eq!(diagnostics[1].line, 2);
    }

    #[test]
    fn line_zero_is_a_checker_failure() {
        let checker = FixedChecker {
            name: "zero",
            ascending: false,
            diagnostics: vec![Diagnostic::new(0, "bad")],
        };
        let adapter = CheckerAdapter::new(Arc::new(checker));
        let failure = adapter
            .run(&CheckConfiguration::new("zero"), &source())
            .expect_err("line 0 should be rejected");
        assert_eq!(failure.checker, "zero");
        assert_eq!(failure.identity, source().identity);
        assert!(failure.to_string().contains("line 0"));
    }

    #[test]
    fn registry_selects_by_checker_name() {
        let mut registry = CheckerRegistry::new();
        registry.register(Arc::new(FixedChecker {
            name: "indentation",
            ascending: true,
            diagnostics: Vec::new(),
        }));

        let adapter = registry
            .select(&CheckConfiguration::new("indentation"))
            .expect("registered checker should be selected");
        assert_eq!(adapter.name(), "indentation");

        let error = registry
            .select(&CheckConfiguration::new("whitespace"))
            .expect_err("unknown checker should be fatal");
        assert_eq!(error.placeholder(), "INPUT.CHECKER_UNKNOWN");
        assert!(error.message().contains("known: indentation"));
    }
}
