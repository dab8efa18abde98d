//! File name exclusion globs
//!
//! Patterns use shell glob syntax (`*`, `?`, `[set]`, `[!set]`, `{a,b}`) and
//! are matched against the bare file name, never the path. Each glob is
//! compiled once into a matcher.

use crate::error::ConfigError;
use globset::{GlobBuilder, GlobMatcher};

/// Compiled exclusion set; the first matching pattern wins
#[derive(Debug, Clone, Default)]
pub struct ExcludeSet {
    patterns: Vec<(String, GlobMatcher)>,
}

impl ExcludeSet {
    /// Compile `patterns`; blank entries are ignored
    ///
    /// `case_sensitive` follows the storage backend's name semantics.
    pub fn compile(patterns: &[String], case_sensitive: bool) -> Result<Self, ConfigError> {
        let patterns = patterns
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(|p| {
                GlobBuilder::new(p)
                    .case_insensitive(!case_sensitive)
                    .build()
                    .map(|glob| (p.to_string(), glob.compile_matcher()))
                    .map_err(|e| ConfigError::InvalidExcludePattern {
                        pattern: p.to_string(),
                        reason: e.kind().to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { patterns })
    }

    /// The first pattern matching `name`, if any
    pub fn matching_pattern(&self, name: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|(_, matcher)| matcher.is_match(name))
            .map(|(p, _)| p.as_str())
    }

    /// Check if a file name should be skipped
    pub fn is_excluded(&self, name: &str) -> bool {
        self.matching_pattern(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(patterns: &[&str], case_sensitive: bool) -> ExcludeSet {
        let owned: Vec<String> = patterns.iter().map(|p| p.to_string()).collect();
        ExcludeSet::compile(&owned, case_sensitive).unwrap()
    }

    #[test]
    fn test_default_patterns() {
        let excludes = set(&["*.tmp", "~$*", ".DS_Store", "Thumbs.db"], true);

        assert!(excludes.is_excluded("b.tmp"));
        assert!(excludes.is_excluded("~$budget.xlsx"));
        assert!(excludes.is_excluded(".DS_Store"));
        assert!(excludes.is_excluded("Thumbs.db"));

        assert!(!excludes.is_excluded("a.txt"));
        assert!(!excludes.is_excluded("b.tmp.pdf"));
        assert!(!excludes.is_excluded("xThumbs.db"));
    }

    #[test]
    fn test_question_mark_and_sets() {
        let excludes = set(&["report-?.csv", "log[0-9].txt", "draft[!a-c].doc"], true);

        assert!(excludes.is_excluded("report-1.csv"));
        assert!(!excludes.is_excluded("report-10.csv"));
        assert!(excludes.is_excluded("log7.txt"));
        assert!(!excludes.is_excluded("logx.txt"));
        assert!(excludes.is_excluded("draftz.doc"));
        assert!(!excludes.is_excluded("drafta.doc"));
    }

    #[test]
    fn test_special_characters_are_literal() {
        let excludes = set(&["a+b(1).txt", "*.{bak,old}"], true);
        assert!(excludes.is_excluded("a+b(1).txt"));
        assert!(!excludes.is_excluded("aab1.txt"));
        assert!(excludes.is_excluded("notes.old"));
        assert!(!excludes.is_excluded("notes.new"));
    }

    #[test]
    fn test_case_sensitivity_follows_backend() {
        let sensitive = set(&["*.TMP"], true);
        assert!(!sensitive.is_excluded("x.tmp"));

        let insensitive = set(&["*.TMP"], false);
        assert!(insensitive.is_excluded("x.tmp"));
    }

    #[test]
    fn test_first_match_wins() {
        let excludes = set(&["*.log", "app*"], true);
        assert_eq!(excludes.matching_pattern("app.log"), Some("*.log"));
        assert_eq!(excludes.matching_pattern("app.txt"), Some("app*"));
        assert_eq!(excludes.matching_pattern("x.txt"), None);
    }

    #[test]
    fn test_blank_patterns_ignored() {
        let excludes = set(&["", "  ", "*.tmp"], true);
        assert_eq!(excludes.len(), 1);
        assert!(ExcludeSet::default().is_empty());
    }

    #[test]
    fn test_invalid_patterns_rejected() {
        for bad in ["[z-a]", "[abc"] {
            let err = ExcludeSet::compile(&[bad.to_string()], true).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidExcludePattern { .. }));
        }
    }
}
