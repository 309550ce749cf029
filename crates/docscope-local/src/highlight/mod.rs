//! Reversible keyword highlighting over rendered content.
//!
//! The engine is written once against [`TextSurface`]; the markup tree, the spreadsheet grid
//! and the paginated text layer each provide an adapter. Every pass starts by unwrapping the
//! markers of the previous pass, so repeated calls never nest markers or leave stale ones.

pub mod runs;

use crate::markup::escape_html;
use crate::pattern::KeywordPattern;
use docscope_core::KeywordSet;
use serde::Serialize;

pub const MARKER_TAG: &str = "mark";
pub const MARKER_CLASS: &str = "keyword-highlight";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Text(String),
    Marker(String),
}

impl Fragment {
    pub fn text(&self) -> &str {
        match self {
            Self::Text(t) | Self::Marker(t) => t,
        }
    }

    pub fn is_marker(&self) -> bool {
        matches!(self, Self::Marker(_))
    }
}

pub fn marker_html(text: &str) -> String {
    format!(
        "<{MARKER_TAG} class=\"{MARKER_CLASS}\">{}</{MARKER_TAG}>",
        escape_html(text)
    )
}

/// A rendered surface whose text leaves can be enumerated and replaced.
pub trait TextSurface {
    /// Handle to one text leaf. Handles returned by one `text_leaves` call stay valid while
    /// leaves are replaced in reverse document order.
    type Leaf: Copy;

    /// Replace every marker with its own text and merge adjacent text. Returns the number of
    /// markers removed.
    fn clear_markers(&mut self) -> usize;

    /// Text leaves in document order.
    fn text_leaves(&self) -> Vec<Self::Leaf>;

    fn leaf_text(&self, leaf: Self::Leaf) -> &str;

    fn replace_leaf(&mut self, leaf: Self::Leaf, fragments: Vec<Fragment>);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HighlightStats {
    /// Markers removed from the previous pass.
    pub cleared: usize,
    pub leaves_scanned: usize,
    pub leaves_split: usize,
    pub markers: usize,
    /// True when the keyword pattern could not be built and the scan was skipped.
    pub skipped: bool,
}

/// Clear previous markers, then mark every keyword occurrence.
///
/// An empty keyword set only clears. A keyword set whose pattern cannot be built is logged
/// and treated like an empty one.
pub fn highlight<S: TextSurface + ?Sized>(surface: &mut S, keywords: &KeywordSet) -> HighlightStats {
    match KeywordPattern::new(keywords) {
        Ok(pattern) => highlight_with_pattern(surface, pattern.as_ref()),
        Err(e) => {
            tracing::warn!(error = %e, terms = keywords.len(), "highlight skipped");
            HighlightStats {
                skipped: true,
                ..highlight_with_pattern(surface, None)
            }
        }
    }
}

/// Same as [`highlight`] with a pattern the caller already built; `None` only clears.
pub fn highlight_with_pattern<S: TextSurface + ?Sized>(
    surface: &mut S,
    pattern: Option<&KeywordPattern>,
) -> HighlightStats {
    let mut stats = HighlightStats {
        cleared: surface.clear_markers(),
        ..HighlightStats::default()
    };
    if let Some(pattern) = pattern {
        scan(surface, pattern, &mut stats);
    }
    stats
}

fn scan<S: TextSurface + ?Sized>(surface: &mut S, pattern: &KeywordPattern, stats: &mut HighlightStats) {
    let leaves = surface.text_leaves();
    stats.leaves_scanned = leaves.len();
    for leaf in leaves.into_iter().rev() {
        let Some(fragments) = split_matches(surface.leaf_text(leaf), pattern) else {
            continue;
        };
        stats.leaves_split += 1;
        stats.markers += fragments.iter().filter(|f| f.is_marker()).count();
        surface.replace_leaf(leaf, fragments);
    }
}

/// Split `text` at match boundaries. `None` when nothing matches.
pub fn split_matches(text: &str, pattern: &KeywordPattern) -> Option<Vec<Fragment>> {
    let mut out = Vec::new();
    let mut last = 0usize;
    for m in pattern.regex().find_iter(text) {
        if m.start() == m.end() {
            continue;
        }
        if m.start() > last {
            out.push(Fragment::Text(text[last..m.start()].to_string()));
        }
        out.push(Fragment::Marker(m.as_str().to_string()));
        last = m.end();
    }
    if out.is_empty() {
        return None;
    }
    if last < text.len() {
        out.push(Fragment::Text(text[last..].to_string()));
    }
    Some(out)
}
