use docscope_core::{KeywordSet, TokenizerMode};

/// Turn a raw query into the keyword set for filtering and highlighting.
///
/// - `multi-term`: whitespace and commas separate terms.
/// - `exact-phrase`: the trimmed query is one term.
pub fn tokenize(query: &str, mode: TokenizerMode) -> KeywordSet {
    match mode {
        TokenizerMode::MultiTerm => {
            KeywordSet::from_terms(query.split(|c: char| c.is_whitespace() || c == ','))
        }
        TokenizerMode::ExactPhrase => KeywordSet::from_terms(std::iter::once(query.trim())),
    }
}
