pub mod layout;

pub use layout::{ORACLE_SUFFIX, OracleLayout, split_corpus_token};

use crate::domain::{
    FixtureIdentity, HarnessError, HarnessResult, OracleExpectation, SourceFixture,
};
use globset::{Glob, GlobMatcher};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("fixture '{identity}' not found at '{}'", .path.display())]
    NotFound {
        identity: FixtureIdentity,
        path: PathBuf,
    },
    #[error("fixture '{identity}' has no oracle at '{}'", .path.display())]
    NoOracle {
        identity: FixtureIdentity,
        path: PathBuf,
    },
    #[error("fixture identity '{identity}' is invalid: {reason}")]
    InvalidIdentity {
        identity: FixtureIdentity,
        reason: String,
    },
    #[error("failed to read fixture '{}': {source}", .path.display())]
    ReadFixture {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read oracle '{}': {source}", .path.display())]
    ReadOracle {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse oracle '{}': {source}", .path.display())]
    ParseOracle {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to read directory '{}': {source}", .path.display())]
    ReadDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Glob over project names; a plain name only matches itself.
#[derive(Debug, Clone)]
pub struct ProjectFilter {
    pattern: String,
    matcher: GlobMatcher,
}

impl ProjectFilter {
    pub fn new(pattern: &str) -> HarnessResult<Self> {
        let matcher = Glob::new(pattern)
            .map_err(|source| {
                HarnessError::input_validation(
                    "INPUT.PROJECT_FILTER",
                    format!("invalid project filter '{}': {}", pattern, source),
                )
            })?
            .compile_matcher();
        Ok(Self {
            pattern: pattern.to_string(),
            matcher,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self, project: &str) -> bool {
        self.matcher.is_match(project)
    }
}

/// Read-only view over a fixture tree laid out as `<root>/<project>-<commit>/<path...>`.
///
/// Holds no mutable state, so one store is shared by reference across all workers.
#[derive(Debug, Clone)]
pub struct FixtureStore {
    root: PathBuf,
    oracle_layout: OracleLayout,
}

impl FixtureStore {
    /// Fails when the root is missing or not a directory; the run cannot start without it.
    pub fn open(root: impl Into<PathBuf>) -> HarnessResult<Self> {
        let root = root.into();
        if !root.exists() {
            return Err(HarnessError::io_system(
                "IO.FIXTURE_ROOT",
                format!("fixture root '{}' does not exist", root.display()),
            ));
        }
        if !root.is_dir() {
            return Err(HarnessError::input_validation(
                "INPUT.FIXTURE_ROOT",
                format!("fixture root '{}' is not a directory", root.display()),
            ));
        }
        Ok(Self {
            root,
            oracle_layout: OracleLayout::Sidecar,
        })
    }

    pub fn with_oracle_layout(mut self, oracle_layout: OracleLayout) -> Self {
        self.oracle_layout = oracle_layout;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn oracle_layout(&self) -> &OracleLayout {
        &self.oracle_layout
    }

    pub fn fixture_path(&self, identity: &FixtureIdentity) -> PathBuf {
        layout::fixture_path(&self.root, identity)
    }

    pub fn oracle_path(&self, identity: &FixtureIdentity) -> PathBuf {
        layout::oracle_path(&self.oracle_layout, &self.root, identity)
    }

    pub fn resolve(&self, identity: &FixtureIdentity) -> Result<SourceFixture, StoreError> {
        check_identity(identity)?;
        let path = self.fixture_path(identity);
        if !path.is_file() {
            return Err(StoreError::NotFound {
                identity: identity.clone(),
                path,
            });
        }
        let content = fs::read(&path).map_err(|source| StoreError::ReadFixture {
            path: path.clone(),
            source,
        })?;
        Ok(SourceFixture::new(identity.clone(), content))
    }

    pub fn load_oracle(&self, identity: &FixtureIdentity) -> Result<OracleExpectation, StoreError> {
        check_identity(identity)?;
        let path = self.oracle_path(identity);
        if !path.is_file() {
            return Err(StoreError::NoOracle {
                identity: identity.clone(),
                path,
            });
        }
        let content = fs::read_to_string(&path).map_err(|source| StoreError::ReadOracle {
            path: path.clone(),
            source,
        })?;
        let expected: Vec<String> =
            serde_json::from_str(&content).map_err(|source| StoreError::ParseOracle {
                path: path.clone(),
                source,
            })?;
        Ok(OracleExpectation::new(identity.clone(), expected))
    }

    /// Lazily walks the tree. Each call starts a fresh walk from the root.
    pub fn list_fixtures(&self, filter: Option<&ProjectFilter>) -> FixtureWalk {
        let skip_oracle_files = matches!(self.oracle_layout, OracleLayout::Sidecar);
        FixtureWalk::new(self.root.clone(), filter.cloned(), skip_oracle_files)
    }
}

fn check_identity(identity: &FixtureIdentity) -> Result<(), StoreError> {
    match layout::identity_problem(identity) {
        Some(reason) => Err(StoreError::InvalidIdentity {
            identity: identity.clone(),
            reason,
        }),
        None => Ok(()),
    }
}

#[derive(Debug)]
struct CorpusDir {
    project: String,
    commit_hash: String,
    path: PathBuf,
}

#[derive(Debug)]
struct CorpusCursor {
    corpus: CorpusDir,
    // Reverse-sorted so `pop` yields entries in ascending order.
    pending: Vec<WalkEntry>,
    // Canonical directories already entered; stops symlink cycles.
    visited: HashSet<PathBuf>,
}

impl CorpusCursor {
    fn open(corpus: CorpusDir) -> Self {
        let path = corpus.path.clone();
        let mut cursor = Self {
            corpus,
            pending: Vec::new(),
            visited: HashSet::new(),
        };
        cursor.descend(&path);
        cursor
    }

    fn descend(&mut self, directory: &Path) {
        match fs::canonicalize(directory) {
            Ok(canonical) => {
                if !self.visited.insert(canonical) {
                    tracing::warn!(
                        path = %directory.display(),
                        "skipping directory already visited through a symlink"
                    );
                    return;
                }
            }
            Err(error) => {
                tracing::warn!(
                    path = %directory.display(),
                    %error,
                    "skipping unresolvable directory"
                );
                return;
            }
        }
        self.pending.extend(read_sorted_entries(directory));
    }
}

#[derive(Debug)]
struct WalkEntry {
    path: PathBuf,
    is_dir: bool,
}

/// Depth-first walk yielding one identity per fixture file, in sorted order.
///
/// Directories are read only when the walk reaches them. Symlinks are followed;
/// a directory reached twice is entered once. Unreadable directories, dangling
/// links and names that do not parse as `<project>-<commit>` are logged and skipped.
#[derive(Debug)]
pub struct FixtureWalk {
    root: PathBuf,
    filter: Option<ProjectFilter>,
    skip_oracle_files: bool,
    corpora: Option<std::vec::IntoIter<CorpusDir>>,
    current: Option<CorpusCursor>,
}

impl FixtureWalk {
    fn new(root: PathBuf, filter: Option<ProjectFilter>, skip_oracle_files: bool) -> Self {
        Self {
            root,
            filter,
            skip_oracle_files,
            corpora: None,
            current: None,
        }
    }

    fn next_corpus(&mut self) -> Option<CorpusDir> {
        if self.corpora.is_none() {
            let corpora = discover_corpora(&self.root, self.filter.as_ref());
            self.corpora = Some(corpora.into_iter());
        }
        self.corpora.as_mut().and_then(Iterator::next)
    }
}

impl Iterator for FixtureWalk {
    type Item = FixtureIdentity;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(cursor) = self.current.as_mut() {
                while let Some(entry) = cursor.pending.pop() {
                    if entry.is_dir {
                        cursor.descend(&entry.path);
                        continue;
                    }
                    if self.skip_oracle_files && layout::is_oracle_file(&entry.path) {
                        continue;
                    }
                    let relative = entry
                        .path
                        .strip_prefix(&cursor.corpus.path)
                        .unwrap_or(&entry.path);
                    return Some(FixtureIdentity::new(
                        cursor.corpus.project.clone(),
                        cursor.corpus.commit_hash.clone(),
                        layout::normalize_relative_path(relative),
                    ));
                }
                self.current = None;
            }

            let corpus = self.next_corpus()?;
            self.current = Some(CorpusCursor::open(corpus));
        }
    }
}

fn discover_corpora(root: &Path, filter: Option<&ProjectFilter>) -> Vec<CorpusDir> {
    let mut corpora = Vec::new();
    // Ascending order here; the iterator is consumed front to back.
    let mut entries = read_sorted_entries(root);
    entries.reverse();

    for entry in entries {
        let Some(name) = entry.path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if !entry.is_dir {
            tracing::debug!(path = %entry.path.display(), "ignoring file at fixture root");
            continue;
        }
        let Some((project, commit_hash)) = split_corpus_token(name) else {
            tracing::warn!(
                directory = name,
                "skipping directory without a <project>-<commit> name"
            );
            continue;
        };
        if filter.is_some_and(|filter| !filter.matches(project)) {
            continue;
        }
        corpora.push(CorpusDir {
            project: project.to_string(),
            commit_hash: commit_hash.to_string(),
            path: entry.path.clone(),
        });
    }
    corpora
}

fn read_sorted_entries(directory: &Path) -> Vec<WalkEntry> {
    match try_read_sorted_entries(directory) {
        Ok(entries) => entries,
        Err(error) => {
            tracing::warn!(error = %error, "skipping unreadable directory");
            Vec::new()
        }
    }
}

fn try_read_sorted_entries(directory: &Path) -> Result<Vec<WalkEntry>, StoreError> {
    let read_dir = fs::read_dir(directory).map_err(|source| StoreError::ReadDirectory {
        path: directory.to_path_buf(),
        source,
    })?;

    let mut entries = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|source| StoreError::ReadDirectory {
            path: directory.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let mut file_type = entry
            .file_type()
            .map_err(|source| StoreError::ReadDirectory {
                path: path.clone(),
                source,
            })?;
        if file_type.is_symlink() {
            match fs::metadata(&path) {
                Ok(target) => file_type = target.file_type(),
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "skipping dangling symlink");
                    continue;
                }
            }
        }

        if file_type.is_dir() {
            entries.push(WalkEntry { path, is_dir: true });
        } else if file_type.is_file() {
            entries.push(WalkEntry {
                path,
                is_dir: false,
            });
        }
    }

    entries.sort_by(|left, right| right.path.cmp(&left.path));
    Ok(entries)
}
