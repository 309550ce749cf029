//! Flat inline content (text and marker runs) used by grid cells and text-layer spans.

use super::{marker_html, Fragment};
use crate::markup::escape_html;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineRuns {
    runs: Vec<Fragment>,
}

impl InlineRuns {
    pub fn plain(text: &str) -> Self {
        if text.is_empty() {
            return Self::default();
        }
        Self {
            runs: vec![Fragment::Text(text.to_string())],
        }
    }

    pub fn runs(&self) -> &[Fragment] {
        &self.runs
    }

    pub fn text(&self) -> String {
        self.runs.iter().map(Fragment::text).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.iter().all(|r| r.text().is_empty())
    }

    pub fn marker_count(&self) -> usize {
        self.runs.iter().filter(|r| r.is_marker()).count()
    }

    /// Turn markers back into text and merge neighbours. Returns markers removed.
    pub fn clear_markers(&mut self) -> usize {
        let removed = self.marker_count();
        if removed == 0 {
            return 0;
        }
        let mut merged: Vec<Fragment> = Vec::with_capacity(self.runs.len());
        for run in self.runs.drain(..) {
            let text = match run {
                Fragment::Text(t) | Fragment::Marker(t) => t,
            };
            if text.is_empty() {
                continue;
            }
            match merged.last_mut() {
                Some(Fragment::Text(prev)) => prev.push_str(&text),
                _ => merged.push(Fragment::Text(text)),
            }
        }
        self.runs = merged;
        removed
    }

    pub fn text_run_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.runs
            .iter()
            .enumerate()
            .filter(|(_, r)| matches!(r, Fragment::Text(t) if !t.is_empty()))
            .map(|(i, _)| i)
    }

    pub fn run_text(&self, index: usize) -> &str {
        self.runs.get(index).map(Fragment::text).unwrap_or("")
    }

    pub fn replace_run(&mut self, index: usize, fragments: Vec<Fragment>) {
        if index < self.runs.len() {
            self.runs.splice(index..=index, fragments);
        }
    }

    /// Serialize as HTML; `line_breaks` renders `\n` as `<br>`.
    pub fn write_html(&self, out: &mut String, line_breaks: bool) {
        for run in &self.runs {
            match run {
                Fragment::Text(text) => {
                    let escaped = escape_html(text);
                    if line_breaks {
                        out.push_str(&escaped.replace('\n', "<br>"));
                    } else {
                        out.push_str(&escaped);
                    }
                }
                // Keywords never span a line break.
                Fragment::Marker(text) => out.push_str(&marker_html(text)),
            }
        }
    }
}
