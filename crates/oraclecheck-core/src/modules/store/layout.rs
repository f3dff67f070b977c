use crate::domain::FixtureIdentity;
use std::path::{Component, Path, PathBuf};

pub const ORACLE_SUFFIX: &str = ".oracle.json";

pub const MIN_COMMIT_HASH_LEN: usize = 7;
pub const MAX_COMMIT_HASH_LEN: usize = 40;

/// Where the oracle record for a fixture is kept.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OracleLayout {
    /// `<fixture path>.oracle.json`, next to the fixture itself.
    #[default]
    Sidecar,
    /// `<oracle root>/<project>-<commit>/<relative path>.oracle.json`.
    Tree(PathBuf),
}

/// Splits a `<project>-<commit_hash>` directory name.
///
/// The commit hash is the last hyphen-delimited token and must be 7 to 40 hex
/// digits, so `spring-boot-1a2b3c4` splits into `spring-boot` and `1a2b3c4`.
pub fn split_corpus_token(token: &str) -> Option<(&str, &str)> {
    let (project, commit_hash) = token.rsplit_once('-')?;
    if project.is_empty() || !is_commit_hash(commit_hash) {
        return None;
    }
    Some((project, commit_hash))
}

pub fn is_commit_hash(token: &str) -> bool {
    (MIN_COMMIT_HASH_LEN..=MAX_COMMIT_HASH_LEN).contains(&token.len())
        && token.bytes().all(|byte| byte.is_ascii_hexdigit())
}

pub fn is_oracle_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(ORACLE_SUFFIX))
}

pub fn fixture_path(root: &Path, identity: &FixtureIdentity) -> PathBuf {
    root.join(identity.corpus_token())
        .join(&identity.relative_path)
}

pub fn oracle_path(
    layout: &OracleLayout,
    fixture_root: &Path,
    identity: &FixtureIdentity,
) -> PathBuf {
    let base = match layout {
        OracleLayout::Sidecar => fixture_path(fixture_root, identity),
        OracleLayout::Tree(oracle_root) => fixture_path(oracle_root, identity),
    };
    let mut file_name = base.as_os_str().to_os_string();
    file_name.push(ORACLE_SUFFIX);
    PathBuf::from(file_name)
}

/// Rejects identities that would escape the fixture root once joined onto it.
pub fn identity_problem(identity: &FixtureIdentity) -> Option<String> {
    if identity.project.is_empty() {
        return Some("project is empty".to_string());
    }
    if !is_commit_hash(&identity.commit_hash) {
        return Some(format!(
            "commit hash '{}' is not {}-{} hex digits",
            identity.commit_hash, MIN_COMMIT_HASH_LEN, MAX_COMMIT_HASH_LEN
        ));
    }
    if identity.project.contains(['/', '\\']) {
        return Some(format!(
            "project '{}' contains a path separator",
            identity.project
        ));
    }
    if identity.relative_path.is_empty() {
        return Some("relative path is empty".to_string());
    }

    let relative = Path::new(&identity.relative_path);
    let escapes = relative
        .components()
        .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Some(format!(
            "relative path '{}' must stay inside the fixture directory",
            identity.relative_path
        ));
    }
    None
}

pub fn normalize_relative_path(path: &Path) -> String {
    let mut normalized = path.to_string_lossy().replace('\\', "/");
    while let Some(stripped) = normalized.strip_prefix("./") {
        normalized = stripped.to_string();
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::{
        OracleLayout, identity_problem, is_commit_hash, is_oracle_file, oracle_path,
        split_corpus_token,
    };
    use crate::domain::FixtureIdentity;
    use std::path::{Path, PathBuf};

    #[test]
    fn splits_on_last_hyphen_when_suffix_is_a_commit_hash() {
        assert_eq!(
            split_corpus_token("checkstyle-1f3e5a7"),
            Some(("checkstyle", "1f3e5a7"))
        );
        assert_eq!(
            split_corpus_token("spring-boot-0123456789abcdef0123456789abcdef01234567"),
            Some(("spring-boot", "0123456789abcdef0123456789abcdef01234567"))
        );
        assert_eq!(
            split_corpus_token("lib-abcdef1-7654321"),
            Some(("lib-abcdef1", "7654321"))
        );
    }

    #[test]
    fn rejects_tokens_without_a_hex_commit_suffix() {
        assert_eq!(split_corpus_token("checkstyle"), None);
        assert_eq!(split_corpus_token("my-project-v2"), None);
        assert_eq!(split_corpus_token("-1f3e5a7"), None);
        assert_eq!(split_corpus_token("short-abc12"), None);
        assert_eq!(split_corpus_token("nothex-zzzzzzz"), None);
    }

    #[test]
    fn commit_hash_length_bounds_are_inclusive() {
        assert!(is_commit_hash("abcdef0"));
        assert!(is_commit_hash(&"a".repeat(40)));
        assert!(!is_commit_hash("abcdef"));
        assert!(!is_commit_hash(&"a".repeat(41)));
    }

    #[test]
    fn oracle_paths_follow_the_selected_layout() {
        let identity = FixtureIdentity::new("guava", "a1b2c3d", "src/Lists.java");
        let root = Path::new("/corpus");

        assert_eq!(
            oracle_path(&OracleLayout::Sidecar, root, &identity),
            PathBuf::from("/corpus/guava-a1b2c3d/src/Lists.java.oracle.json")
        );
        assert_eq!(
            oracle_path(
                &OracleLayout::Tree(PathBuf::from("/oracles")),
                root,
                &identity
            ),
            PathBuf::from("/oracles/guava-a1b2c3d/src/Lists.java.oracle.json")
        );
        assert!(is_oracle_file(Path::new("x/Lists.java.oracle.json")));
        assert!(!is_oracle_file(Path::new("x/Lists.java")));
    }

    #[test]
    fn identity_problem_flags_escaping_paths() {
        let ok = FixtureIdentity::new("guava", "a1b2c3d", "src/Lists.java");
        assert_eq!(identity_problem(&ok), None);

        let parent = FixtureIdentity::new("guava", "a1b2c3d", "../secret.txt");
        assert!(identity_problem(&parent).is_some());

        let bad_commit = FixtureIdentity::new("guava", "HEAD", "src/Lists.java");
        assert!(identity_problem(&bad_commit).is_some());
    }
}
