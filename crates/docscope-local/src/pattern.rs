//! The keyword matcher shared by ranking and highlighting.

use docscope_core::{Error, KeywordSet, Result};
use regex::{Regex, RegexBuilder};

/// Upper bound on the compiled pattern; a pathological query fails instead of stalling.
pub const DEFAULT_SIZE_LIMIT: usize = 1 << 20;

/// Escaped, case-insensitive alternation of every keyword.
#[derive(Debug, Clone)]
pub struct KeywordPattern {
    regex: Regex,
}

impl KeywordPattern {
    /// `Ok(None)` for an empty keyword set (nothing to match).
    pub fn new(keywords: &KeywordSet) -> Result<Option<Self>> {
        Self::with_size_limit(keywords, DEFAULT_SIZE_LIMIT)
    }

    pub fn with_size_limit(keywords: &KeywordSet, size_limit: usize) -> Result<Option<Self>> {
        if keywords.is_empty() {
            return Ok(None);
        }
        // Longest first: with leftmost-first alternation, "apple" must win over "app".
        let mut terms: Vec<&str> = keywords.iter().collect();
        terms.sort_by_key(|t| std::cmp::Reverse(t.chars().count()));
        let alternation = terms
            .iter()
            .map(|t| regex::escape(t))
            .collect::<Vec<_>>()
            .join("|");
        let regex = RegexBuilder::new(&alternation)
            .case_insensitive(true)
            .size_limit(size_limit)
            .build()
            .map_err(|e| Error::Pattern(e.to_string()))?;
        Ok(Some(Self { regex }))
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.regex.is_match(haystack)
    }

    /// Number of non-overlapping matches.
    pub fn count_matches(&self, haystack: &str) -> usize {
        self.regex.find_iter(haystack).count()
    }
}
