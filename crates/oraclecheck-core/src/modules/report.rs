use super::runner::{OraclePolicy, RunOutcome};
use crate::domain::{
    CheckConfiguration, EXIT_FAILED, EXIT_PASSED, FixtureStatus, FixtureVerdict, HarnessError,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub generated_at_unix_seconds: u64,
    pub passed: bool,
    pub cancelled: bool,
    pub fixture_root: String,
    pub checker: String,
    pub attributes: BTreeMap<String, String>,
    pub oracle_policy: OraclePolicy,
    pub strict_order: bool,
    pub fixture_count: usize,
    pub passed_fixture_count: usize,
    pub failed_fixture_count: usize,
    pub skipped_fixture_count: usize,
    pub fixtures: Vec<FixtureVerdict>,
}

impl RunReport {
    pub fn new(
        fixture_root: &Path,
        config: &CheckConfiguration,
        oracle_policy: OraclePolicy,
        strict_order: bool,
        outcome: RunOutcome,
    ) -> Self {
        let count = |status: FixtureStatus| {
            outcome
                .verdicts
                .iter()
                .filter(|verdict| verdict.status == status)
                .count()
        };
        let passed_fixture_count = count(FixtureStatus::Passed);
        let failed_fixture_count = count(FixtureStatus::Failed);
        let skipped_fixture_count = count(FixtureStatus::Skipped);

        Self {
            generated_at_unix_seconds: current_unix_timestamp_seconds(),
            passed: outcome.all_passed(),
            cancelled: outcome.cancelled,
            fixture_root: normalize_path(fixture_root),
            checker: outcome.checker,
            attributes: config.attributes.clone(),
            oracle_policy,
            strict_order,
            fixture_count: outcome.verdicts.len(),
            passed_fixture_count,
            failed_fixture_count,
            skipped_fixture_count,
            fixtures: outcome.verdicts,
        }
    }

    pub fn exit_code(&self) -> i32 {
        if self.passed { EXIT_PASSED } else { EXIT_FAILED }
    }
}

pub fn render_human_summary(report: &RunReport) -> String {
    let mut lines = Vec::new();
    let status = if report.cancelled {
        "CANCELLED"
    } else if report.passed {
        "PASS"
    } else {
        "FAIL"
    };
    lines.push(format!("Oracle status: {}", status));
    lines.push(format!(
        "Fixtures: {} total ({} passed, {} failed, {} skipped)",
        report.fixture_count,
        report.passed_fixture_count,
        report.failed_fixture_count,
        report.skipped_fixture_count
    ));

    for fixture in &report.fixtures {
        lines.push(format!(
            "Fixture {}: {}",
            fixture.identity,
            fixture.status.as_str()
        ));

        if let Some(failure) = &fixture.failure {
            lines.push(format!("  error [{}]: {}", failure.kind.as_str(), failure.message));
        }
        if fixture.status != FixtureStatus::Failed {
            continue;
        }
        if let Some(comparison) = &fixture.comparison {
            for entry in &comparison.missing {
                lines.push(format!("  missing: {}", entry));
            }
            for entry in &comparison.unexpected {
                lines.push(format!("  unexpected: {}", entry));
            }
            if let Some(position) = comparison.first_order_mismatch {
                lines.push(format!(
                    "  order: diagnostics differ from the oracle starting at entry {}",
                    position + 1
                ));
            }
        }
    }

    if report.cancelled {
        lines.push("Run cancelled before every fixture was processed".to_string());
    }

    lines.join("\n")
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to create report directory '{}': {source}", .path.display())]
    ReportDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to serialize report '{}': {source}", .path.display())]
    SerializeReport {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to write report '{}': {source}", .path.display())]
    WriteReport {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl From<ReportError> for HarnessError {
    fn from(error: ReportError) -> Self {
        let message = error.to_string();
        match error {
            ReportError::SerializeReport { .. } => {
                HarnessError::internal("INTERNAL.REPORT", message)
            }
            ReportError::ReportDirectory { .. } | ReportError::WriteReport { .. } => {
                HarnessError::io_system("IO.REPORT", message)
            }
        }
    }
}

pub fn write_report_file(report_path: &Path, report: &RunReport) -> Result<(), ReportError> {
    if let Some(parent_dir) = report_path.parent() {
        fs::create_dir_all(parent_dir).map_err(|source| ReportError::ReportDirectory {
            path: parent_dir.to_path_buf(),
            source,
        })?;
    }

    let report_json =
        serde_json::to_string_pretty(report).map_err(|source| ReportError::SerializeReport {
            path: report_path.to_path_buf(),
            source,
        })?;
    fs::write(report_path, report_json).map_err(|source| ReportError::WriteReport {
        path: report_path.to_path_buf(),
        source,
    })
}

fn current_unix_timestamp_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs())
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::{RunReport, render_human_summary, write_report_file};
    use crate::domain::{
        CheckConfiguration, ComparisonResult, FailureKind, FixtureFailure, FixtureIdentity,
        FixtureVerdict,
    };
    use crate::modules::runner::{OraclePolicy, RunOutcome};
    use serde_json::Value;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn identity(path: &str) -> FixtureIdentity {
        FixtureIdentity::new("checkstyle", "1f3e5a7", path)
    }

    fn outcome(cancelled: bool) -> RunOutcome {
        let mismatch = ComparisonResult {
            identity: identity("B.java"),
            missing: vec!["109: Indentation".to_string()],
            unexpected: vec!["200: Indentation".to_string()],
            ordered: false,
            first_order_mismatch: None,
        };
        let exact = ComparisonResult {
            identity: identity("A.java"),
            missing: Vec::new(),
            unexpected: Vec::new(),
            ordered: true,
            first_order_mismatch: None,
        };
        RunOutcome {
            checker: "indentation".to_string(),
            verdicts: vec![
                FixtureVerdict::compared(exact, true),
                FixtureVerdict::compared(mismatch, false),
                FixtureVerdict::failed(
                    identity("C.java"),
                    FixtureFailure::new(FailureKind::CheckerFailure, "tool crashed"),
                ),
                FixtureVerdict::skipped(identity("D.java")),
            ],
            cancelled,
        }
    }

    fn report(cancelled: bool) -> RunReport {
        RunReport::new(
            Path::new("corpus"),
            &CheckConfiguration::new("indentation").with_attribute("basicOffset", "4"),
            OraclePolicy::Optional,
            false,
            outcome(cancelled),
        )
    }

    #[test]
    fn counts_verdicts_by_status() {
        let report = report(false);
        assert!(!report.passed);
        assert_eq!(report.fixture_count, 4);
        assert_eq!(report.passed_fixture_count, 1);
        assert_eq!(report.failed_fixture_count, 2);
        assert_eq!(report.skipped_fixture_count, 1);
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn summary_lists_every_fixture_and_failure_detail() {
        let summary = render_human_summary(&report(false));
        assert!(summary.contains("Oracle status: FAIL"));
        assert!(summary.contains("Fixtures: 4 total (1 passed, 2 failed, 1 skipped)"));
        assert!(summary.contains("Fixture checkstyle-1f3e5a7/A.java: PASS"));
        assert!(summary.contains("Fixture checkstyle-1f3e5a7/B.java: FAIL"));
        assert!(summary.contains("  missing: 109: Indentation"));
        assert!(summary.contains("  unexpected: 200: Indentation"));
        assert!(summary.contains("  error [checker_failure]: tool crashed"));
        assert!(summary.contains("Fixture checkstyle-1f3e5a7/D.java: SKIP"));
    }

    #[test]
    fn cancelled_run_is_marked_in_summary() {
        let summary = render_human_summary(&report(true));
        assert!(summary.starts_with("Oracle status: CANCELLED"));
        assert!(summary.ends_with("Run cancelled before every fixture was processed"));
    }

    #[test]
    fn report_file_is_pretty_json_with_nested_directories() {
        let temp = TempDir::new().expect("tempdir should be created");
        let report_path = temp.path().join("out/nested/report.json");
        write_report_file(&report_path, &report(false)).expect("report should be written");

        let json: Value = serde_json::from_str(
            &fs::read_to_string(&report_path).expect("report should be readable"),
        )
        .expect("report should be valid JSON");
        assert_eq!(json["passed"], false);
        assert_eq!(json["checker"], "indentation");
        assert_eq!(json["attributes"]["basicOffset"], "4");
        assert_eq!(json["oracle_policy"], "optional");
        assert_eq!(json["fixtures"][1]["comparison"]["missing"][0], "109: Indentation");
        assert_eq!(json["fixtures"][2]["failure"]["kind"], "checker_failure");
        assert_eq!(json["fixtures"][3]["status"], "skipped");
    }
}
