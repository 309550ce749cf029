//! Keyword ranking and filtering of the document collection.

use crate::pattern::KeywordPattern;
use docscope_core::{DocumentId, DocumentRecord, KeywordSet, RankingPolicy};

/// Name matches weigh double: a keyword in the file name is a strong signal.
pub const NAME_WEIGHT: usize = 2;

pub fn score(doc: &DocumentRecord, pattern: &KeywordPattern) -> usize {
    pattern.count_matches(doc.plain_text()) + NAME_WEIGHT * pattern.count_matches(doc.name())
}

/// Ordered, filtered view of `docs` for the current keywords.
///
/// Empty keywords (or a pattern that cannot be built) leave the collection order untouched.
pub fn rank<'a>(
    docs: &'a [DocumentRecord],
    keywords: &KeywordSet,
    policy: RankingPolicy,
) -> Vec<&'a DocumentRecord> {
    let pattern = match KeywordPattern::new(keywords) {
        Ok(Some(p)) => p,
        Ok(None) => return docs.iter().collect(),
        Err(e) => {
            tracing::warn!(error = %e, "ranking without keyword filter");
            return docs.iter().collect();
        }
    };
    match policy {
        RankingPolicy::Boolean => docs
            .iter()
            .filter(|d| pattern.is_match(d.plain_text()))
            .collect(),
        RankingPolicy::Ranked => {
            let mut scored: Vec<(usize, &DocumentRecord)> = docs
                .iter()
                .map(|d| (score(d, &pattern), d))
                .filter(|(s, _)| *s > 0)
                .collect();
            // Stable: equal score and name keep collection order.
            scored.sort_by(|(sa, a), (sb, b)| sb.cmp(sa).then_with(|| a.name().cmp(b.name())));
            scored.into_iter().map(|(_, d)| d).collect()
        }
    }
}

/// Keep `selected` if it is still in `view`, else fall back to the first entry.
pub fn maintain_selection(
    view: &[&DocumentRecord],
    selected: Option<DocumentId>,
) -> Option<DocumentId> {
    match selected {
        Some(id) if view.iter().any(|d| d.id() == id) => Some(id),
        _ => view.first().map(|d| d.id()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docscope_core::{DocumentFormat, ExtractedContent};

    fn doc(name: &str, text: &str) -> DocumentRecord {
        DocumentRecord::new(
            name,
            DocumentFormat::Docx,
            ExtractedContent {
                safe_markup: String::new(),
                plain_text: text.to_string(),
                error: None,
            },
            None,
        )
    }

    fn names(view: &[&DocumentRecord]) -> Vec<String> {
        view.iter().map(|d| d.name().to_string()).collect()
    }

    #[test]
    fn name_matches_count_double() {
        let docs = vec![doc("Report", "apple apple"), doc("apple-sheet", "apple")];
        let view = rank(&docs, &KeywordSet::from_terms(["apple"]), RankingPolicy::Ranked);
        assert_eq!(names(&view), vec!["apple-sheet", "Report"]);
    }

    #[test]
    fn zero_scores_are_dropped_and_ties_sort_by_name() {
        let docs = vec![
            doc("b.pdf", "kiwi"),
            doc("c.pdf", "nothing"),
            doc("a.pdf", "KIWI"),
        ];
        let view = rank(&docs, &KeywordSet::from_terms(["kiwi"]), RankingPolicy::Ranked);
        assert_eq!(names(&view), vec!["a.pdf", "b.pdf"]);
    }

    #[test]
    fn boolean_policy_filters_text_in_collection_order() {
        let docs = vec![
            doc("z-kiwi.pdf", "no"),
            doc("b.pdf", "kiwi kiwi kiwi"),
            doc("a.pdf", "kiwi"),
        ];
        let view = rank(&docs, &KeywordSet::from_terms(["kiwi"]), RankingPolicy::Boolean);
        assert_eq!(names(&view), vec!["b.pdf", "a.pdf"]);
    }

    #[test]
    fn empty_keywords_keep_everything_in_order() {
        let docs = vec![doc("b", "x"), doc("a", "y")];
        let view = rank(&docs, &KeywordSet::empty(), RankingPolicy::Ranked);
        assert_eq!(names(&view), vec!["b", "a"]);
    }

    #[test]
    fn selection_falls_back_to_first_or_none() {
        let docs = vec![doc("a", "kiwi"), doc("b", "kiwi")];
        let view: Vec<&DocumentRecord> = docs.iter().collect();
        let b = docs[1].id();
        assert_eq!(maintain_selection(&view, Some(b)), Some(b));

        let narrowed = vec![&docs[0]];
        assert_eq!(maintain_selection(&narrowed, Some(b)), Some(docs[0].id()));
        assert_eq!(maintain_selection(&narrowed, None), Some(docs[0].id()));
        assert_eq!(maintain_selection(&[], Some(b)), None);
    }
}
