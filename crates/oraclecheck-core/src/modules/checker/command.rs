use super::{Checker, CheckerFailure};
use crate::domain::{CheckConfiguration, Diagnostic, SourceFixture};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Runs a checking tool as a child process, once per fixture.
///
/// The request goes to stdin as one JSON object; the tool answers on stdout
/// with one JSON diagnostic per line:
/// `{"line": 12, "messageKey": "line.longer", "args": ["80"]}`.
#[derive(Debug, Clone)]
pub struct ExternalCommandChecker {
    name: String,
    program: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    working_dir: Option<PathBuf>,
    ascending_lines: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckRequest<'a> {
    checker: &'a str,
    attributes: &'a BTreeMap<String, String>,
    project: &'a str,
    commit_hash: &'a str,
    relative_path: &'a str,
    source: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireDiagnostic {
    line: u32,
    message_key: String,
    #[serde(default)]
    args: Vec<String>,
}

impl ExternalCommandChecker {
    pub fn new(name: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            working_dir: None,
            ascending_lines: false,
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

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_working_dir(mut self, working_dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(working_dir.into());
        self
    }

    pub fn with_ascending_lines(mut self, ascending_lines: bool) -> Self {
        self.ascending_lines = ascending_lines;
        self
    }

    fn failure(
        &self,
        source: &SourceFixture,
        cause: impl Into<super::CheckerCause>,
    ) -> CheckerFailure {
        CheckerFailure::new(&self.name, source.identity.clone(), cause)
    }
}

impl Checker for ExternalCommandChecker {
    fn name(&self) -> &str {
        &self.name
    }

    fn emits_ascending_lines(&self) -> bool {
        self.ascending_lines
    }

    fn run(
        &self,
        config: &CheckConfiguration,
        source: &SourceFixture,
    ) -> Result<Vec<Diagnostic>, CheckerFailure> {
        let text = source.text();
        let request = CheckRequest {
            checker: &config.checker_name,
            attributes: &config.attributes,
            project: &source.identity.project,
            commit_hash: &source.identity.commit_hash,
            relative_path: &source.identity.relative_path,
            source: &text,
        };
        let payload = serde_json::to_vec(&request)
            .map_err(|error| self.failure(source, format!("failed to encode request: {error}")))?;

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(working_dir) = &self.working_dir {
            command.current_dir(working_dir);
        }
        // Own process group: a terminal Ctrl+C reaches the harness only, which
        // lets the in-flight check finish before the batch stops.
        #[cfg(unix)]
        std::os::unix::process::CommandExt::process_group(&mut command, 0);

        let mut child = command.spawn().map_err(|error| {
            self.failure(
                source,
                format!("failed to spawn '{}': {}", self.program, error),
            )
        })?;

        // Feed stdin from its own thread so a chatty tool cannot deadlock on a full pipe.
        let writer = child.stdin.take().map(|mut stdin| {
            std::thread::spawn(move || stdin.write_all(&payload))
        });
        let output = child.wait_with_output().map_err(|error| {
            self.failure(
                source,
                format!("failed to wait for '{}': {}", self.program, error),
            )
        })?;
        if let Some(writer) = writer {
            match writer.join() {
                Ok(Ok(())) => {}
                // Tools that decide without reading their input close stdin early.
                Ok(Err(error)) if error.kind() == std::io::ErrorKind::BrokenPipe => {}
                Ok(Err(error)) => {
                    return Err(self.failure(source, format!("failed to write request: {error}")));
                }
                Err(_) => {
                    return Err(self.failure(source, "request writer thread panicked"));
                }
            }
        }

        if !output.status.success() {
            let status = output.status.code().map_or_else(
                || "terminated by signal".to_string(),
                |code| format!("exit code {}", code),
            );
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            let detail = if stderr.is_empty() {
                status
            } else {
                format!("{}: {}", status, stderr)
            };
            return Err(self.failure(source, format!("'{}' failed with {}", self.program, detail)));
        }

        parse_diagnostics(&String::from_utf8_lossy(&output.stdout))
            .map_err(|message| self.failure(source, message))
    }
}

fn parse_diagnostics(stdout: &str) -> Result<Vec<Diagnostic>, String> {
    let mut diagnostics = Vec::new();
    for (line_index, raw_line) in stdout.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        let wire: WireDiagnostic = serde_json::from_str(line).map_err(|error| {
            format!(
                "output line {} is not a diagnostic ({}): {}",
                line_index + 1,
                error,
                line
            )
        })?;
        diagnostics.push(Diagnostic::new(wire.line, wire.message_key).with_args(wire.args));
    }
    Ok(diagnostics)
}
