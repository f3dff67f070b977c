pub mod errors;

pub use errors::{
    EXIT_FAILED, EXIT_FATAL, EXIT_PASSED, HarnessError, HarnessErrorCategory, HarnessResult,
};

use serde::Serialize;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Address of one fixture file: `<root>/<project>-<commit_hash>/<relative_path>`.
///
/// `relative_path` always uses `/` separators. The derived ordering sorts by
/// project, then commit, then path, which is the order reports are written in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FixtureIdentity {
    pub project: String,
    pub commit_hash: String,
    pub relative_path: String,
}

impl FixtureIdentity {
    pub fn new(
        project: impl Into<String>,
        commit_hash: impl Into<String>,
        relative_path: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            commit_hash: commit_hash.into(),
            relative_path: relative_path.into(),
        }
    }

    /// The directory name the fixture lives under, `<project>-<commit_hash>`.
    pub fn corpus_token(&self) -> String {
        format!("{}-{}", self.project, self.commit_hash)
    }
}

impl Display for FixtureIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}-{}/{}",
            self.project, self.commit_hash, self.relative_path
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFixture {
    pub identity: FixtureIdentity,
    pub content: Vec<u8>,
}

impl SourceFixture {
    pub fn new(identity: FixtureIdentity, content: impl Into<Vec<u8>>) -> Self {
        Self {
            identity,
            content: content.into(),
        }
    }

    /// Fixtures are assumed UTF-8; invalid sequences are replaced rather than rejected.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckConfiguration {
    pub checker_name: String,
    pub attributes: BTreeMap<String, String>,
}

impl CheckConfiguration {
    pub fn new(checker_name: impl Into<String>) -> Self {
        Self {
            checker_name: checker_name.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// One line-tagged finding. Equality is over `(line, message_key, args)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Diagnostic {
    pub line: u32,
    pub message_key: String,
    pub args: Vec<String>,
}

impl Diagnostic {
    pub fn new(line: u32, message_key: impl Into<String>) -> Self {
        Self {
            line,
            message_key: message_key.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// The recorded `expected[]` list for one fixture, in canonical `"<line>: <message>"` form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OracleExpectation {
    pub identity: FixtureIdentity,
    pub expected: Vec<String>,
}

impl OracleExpectation {
    pub fn new<I, S>(identity: FixtureIdentity, expected: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            identity,
            expected: expected.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.expected.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComparisonResult {
    pub identity: FixtureIdentity,
    pub missing: Vec<String>,
    pub unexpected: Vec<String>,
    pub ordered: bool,
    /// First position where actual and oracle disagree, set only when the two
    /// lists hold the same entries in a different order.
    pub first_order_mismatch: Option<usize>,
}

impl ComparisonResult {
    /// True when every expectation was met and nothing extra was reported.
    pub fn entries_match(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty()
    }
}

/// Terminal outcome of one fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureStatus {
    Passed,
    Failed,
    /// No oracle was recorded and the run allows that.
    Skipped,
}

impl FixtureStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "PASS",
            Self::Failed => "FAIL",
            Self::Skipped => "SKIP",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NotFound,
    NoOracle,
    CheckerFailure,
    ReadFailure,
}

impl FailureKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::NoOracle => "no_oracle",
            Self::CheckerFailure => "checker_failure",
            Self::ReadFailure => "read_failure",
        }
    }
}

/// An error that stopped one fixture from reaching comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixtureFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl FixtureFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// What the runner concluded for one fixture.
///
/// `comparison` is present whenever the checker ran and the diff was computed,
/// including failed comparisons. `failure` is present when the fixture could
/// not be compared at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixtureVerdict {
    pub identity: FixtureIdentity,
    pub status: FixtureStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<ComparisonResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FixtureFailure>,
}

impl FixtureVerdict {
    pub fn compared(comparison: ComparisonResult, passed: bool) -> Self {
        Self {
            identity: comparison.identity.clone(),
            status: if passed {
                FixtureStatus::Passed
            } else {
                FixtureStatus::Failed
            },
            comparison: Some(comparison),
            failure: None,
        }
    }

    pub fn failed(identity: FixtureIdentity, failure: FixtureFailure) -> Self {
        Self {
            identity,
            status: FixtureStatus::Failed,
            comparison: None,
            failure: Some(failure),
        }
    }

    pub fn skipped(identity: FixtureIdentity) -> Self {
        Self {
            identity,
            status: FixtureStatus::Skipped,
            comparison: None,
            failure: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == FixtureStatus::Failed
    }
}
