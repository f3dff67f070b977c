use super::catalog::{KeyCatalog, MessageCatalog, canonical_string};
use crate::domain::{ComparisonResult, Diagnostic, FixtureIdentity, OracleExpectation};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Diffs actual diagnostics against an oracle's expected list.
///
/// Both sides are treated as multisets of canonical strings: each expected entry
/// consumes at most one actual entry, so duplicates must be reported as many
/// times as they are expected.
#[derive(Clone)]
pub struct OracleComparator {
    catalog: Arc<dyn MessageCatalog>,
}

impl Default for OracleComparator {
    fn default() -> Self {
        Self::new(Arc::new(KeyCatalog))
    }
}

impl std::fmt::Debug for OracleComparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleComparator").finish_non_exhaustive()
    }
}

impl OracleComparator {
    pub fn new(catalog: Arc<dyn MessageCatalog>) -> Self {
        Self { catalog }
    }

    pub fn render(&self, diagnostics: &[Diagnostic]) -> Vec<String> {
        diagnostics
            .iter()
            .map(|diagnostic| canonical_string(diagnostic, self.catalog.as_ref()))
            .collect()
    }

    pub fn compare(
        &self,
        identity: &FixtureIdentity,
        actual: &[Diagnostic],
        oracle: &OracleExpectation,
    ) -> ComparisonResult {
        let rendered = self.render(actual);
        compare_rendered(identity, &rendered, &oracle.expected)
    }
}

/// Multiset diff over already-rendered canonical strings.
///
/// Expected entries are matched greedily in oracle order against the earliest
/// unconsumed equal actual entry. `ordered` is set only when nothing is missing
/// or unexpected and the two sequences agree position by position.
pub fn compare_rendered(
    identity: &FixtureIdentity,
    actual: &[String],
    expected: &[String],
) -> ComparisonResult {
    let mut available: HashMap<&str, VecDeque<usize>> = HashMap::new();
    for (index, entry) in actual.iter().enumerate() {
        available.entry(entry.as_str()).or_default().push_back(index);
    }

    let mut consumed = vec![false; actual.len()];
    let mut missing = Vec::new();
    for entry in expected {
        match available
            .get_mut(entry.as_str())
            .and_then(VecDeque::pop_front)
        {
            Some(index) => consumed[index] = true,
            None => missing.push(entry.clone()),
        }
    }

    let unexpected = actual
        .iter()
        .zip(&consumed)
        .filter(|(_, consumed)| !**consumed)
        .map(|(entry, _)| entry.clone())
        .collect::<Vec<_>>();

    let entries_match = missing.is_empty() && unexpected.is_empty();
    let first_order_mismatch = if entries_match {
        actual
            .iter()
            .zip(expected)
            .position(|(actual_entry, expected_entry)| actual_entry != expected_entry)
    } else {
        None
    };

    ComparisonResult {
        identity: identity.clone(),
        missing,
        unexpected,
        ordered: entries_match && first_order_mismatch.is_none(),
        first_order_mismatch,
    }
}

#[cfg(test)]
mod tests {
    use super::{OracleComparator, compare_rendered};
    use crate::domain::{Diagnostic, FixtureIdentity, OracleExpectation};
    use crate::modules::catalog::TemplateCatalog;
    use std::sync::Arc;

    fn identity() -> FixtureIdentity {
        FixtureIdentity::new("checkstyle", "1f3e5a7", "InputIndentation.java")
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn exact_match_is_ordered() {
        let expected = strings(&["3: A", "5: B", "5: B"]);
        let result = compare_rendered(&identity(), &expected, &expected);
        assert!(result.missing.is_empty());
        assert!(result.unexpected.is_empty());
        assert!(result.ordered);
        assert_eq!(result.first_order_mismatch, None);
    }

    #[test]
    fn reports_missing_and_unexpected_entries() {
        let result = compare_rendered(
            &identity(),
            &strings(&["47: Indentation", "200: Indentation"]),
            &strings(&["47: Indentation", "109: Indentation"]),
        );
        assert_eq!(result.missing, strings(&["109: Indentation"]));
        assert_eq!(result.unexpected, strings(&["200: Indentation"]));
        assert!(!result.ordered);
        assert_eq!(result.first_order_mismatch, None);
    }

    #[test]
    fn duplicate_expectations_each_need_a_match() {
        let result = compare_rendered(
            &identity(),
            &strings(&["10: X"]),
            &strings(&["10: X", "10: X"]),
        );
        assert_eq!(result.missing, strings(&["10: X"]));
        assert!(result.unexpected.is_empty());
        assert!(!result.ordered);
    }

    #[test]
    fn extra_duplicate_does_not_mask_missing_entry() {
        let result = compare_rendered(
            &identity(),
            &strings(&["1: A", "1: A", "2: B"]),
            &strings(&["1: A", "2: B", "3: C"]),
        );
        assert_eq!(result.missing, strings(&["3: C"]));
        assert_eq!(result.unexpected, strings(&["1: A"]));
    }

    #[test]
    fn same_entries_in_other_order_are_unordered() {
        let result = compare_rendered(
            &identity(),
            &strings(&["9: B", "3: A"]),
            &strings(&["3: A", "9: B"]),
        );
        assert!(result.entries_match());
        assert!(!result.ordered);
        assert_eq!(result.first_order_mismatch, Some(0));
    }

    #[test]
    fn empty_oracle_reports_every_actual_as_unexpected() {
        let result = compare_rendered(&identity(), &strings(&["1: A", "2: B"]), &[]);
        assert!(result.missing.is_empty());
        assert_eq!(result.unexpected, strings(&["1: A", "2: B"]));
        assert!(!result.ordered);

        let empty = compare_rendered(&identity(), &[], &[]);
        assert!(empty.entries_match());
        assert!(empty.ordered);
    }

    #[test]
    fn compare_renders_through_the_catalog() {
        let catalog = TemplateCatalog::new().with_template("line.longer", "Line longer than {0}.");
        let comparator = OracleComparator::new(Arc::new(catalog));
        let oracle = OracleExpectation::new(identity(), ["12: Line longer than 80."]);
        let actual = vec![Diagnostic::new(12, "line.longer").with_args(["80"])];

        let result = comparator.compare(&identity(), &actual, &oracle);
        assert!(result.ordered);
        assert_eq!(result.identity, identity());

        let mismatched = vec![Diagnostic::new(12, "line.longer").with_args(["100"])];
        let result = comparator.compare(&identity(), &mismatched, &oracle);
        assert_eq!(result.missing, strings(&["12: Line longer than 80."]));
        assert_eq!(result.unexpected, strings(&["12: Line longer than 100."]));
    }

    #[test]
    fn compare_is_idempotent() {
        let comparator = OracleComparator::default();
        let oracle = OracleExpectation::new(identity(), ["1: A", "2: B"]);
        let actual = vec![Diagnostic::new(2, "B"), Diagnostic::new(4, "C")];

        let first = comparator.compare(&identity(), &actual, &oracle);
        let second = comparator.compare(&identity(), &actual, &oracle);
        assert_eq!(first, second);
    }
}
