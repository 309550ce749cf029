//! Paginated text layer: one span per extracted PDF text fragment, grouped by page.
//!
//! Layout is asynchronous. Highlighting is scheduled as a [`HighlightPass`] that waits for the
//! layout-ready signal, yields once, and is applied only if its token is still live and the
//! layout it waited for is still the current one.

use crate::extract::pdf::pdf_page_fragments;
use crate::highlight::runs::InlineRuns;
use crate::highlight::{highlight, Fragment, HighlightStats, TextSurface};
use docscope_core::{Error, KeywordSet, Result};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutState {
    Pending,
    Ready { epoch: u64, pages: usize },
}

#[derive(Debug)]
pub struct PaginatedView {
    pages: Vec<Vec<InlineRuns>>,
    epoch: u64,
    layout: watch::Sender<LayoutState>,
    teardown: CancellationToken,
    pass: Option<CancellationToken>,
}

impl PaginatedView {
    /// Cancelling `parent` tears the view's pending work down with it.
    pub fn new(parent: &CancellationToken) -> Self {
        let (layout, _) = watch::channel(LayoutState::Pending);
        Self {
            pages: Vec::new(),
            epoch: 0,
            layout,
            teardown: parent.child_token(),
            pass: None,
        }
    }

    /// Lay out the text of a PDF, yielding between pages.
    pub async fn load(&mut self, bytes: &[u8]) -> Result<()> {
        self.layout.send_replace(LayoutState::Pending);
        let fragments = pdf_page_fragments(bytes)?;
        let mut pages = Vec::with_capacity(fragments.len());
        for page in fragments {
            if self.teardown.is_cancelled() {
                tracing::debug!(laid_out = pages.len(), "text layer load cancelled");
                return Err(Error::Cancelled);
            }
            pages.push(page.iter().map(|f| InlineRuns::plain(f)).collect());
            tokio::task::yield_now().await;
        }
        self.install(pages)
    }

    pub fn load_pages(&mut self, pages: Vec<Vec<String>>) -> Result<()> {
        let pages = pages
            .iter()
            .map(|page| page.iter().map(|f| InlineRuns::plain(f)).collect())
            .collect();
        self.install(pages)
    }

    fn install(&mut self, pages: Vec<Vec<InlineRuns>>) -> Result<()> {
        if self.teardown.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.pages = pages;
        self.epoch += 1;
        self.layout.send_replace(LayoutState::Ready {
            epoch: self.epoch,
            pages: self.pages.len(),
        });
        Ok(())
    }

    pub fn layout(&self) -> LayoutState {
        *self.layout.borrow()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Start a new pass for `keywords`, cancelling the previous one.
    pub fn schedule_highlight(&mut self, keywords: &KeywordSet) -> HighlightPass {
        self.cancel_pass();
        let token = self.teardown.child_token();
        self.pass = Some(token.clone());
        HighlightPass {
            layout: self.layout.subscribe(),
            token,
            keywords: keywords.clone(),
            epoch: None,
        }
    }

    pub fn cancel_pass(&mut self) {
        if let Some(prev) = self.pass.take() {
            prev.cancel();
        }
    }

    /// Run `pass` against the current pages. A cancelled or stale pass leaves the view untouched.
    pub fn apply(&mut self, pass: &HighlightPass) -> Result<HighlightStats> {
        if pass.token.is_cancelled() {
            tracing::debug!("highlight pass cancelled");
            return Err(Error::Cancelled);
        }
        match (pass.epoch, self.layout()) {
            (Some(waited), LayoutState::Ready { epoch, .. }) if waited == epoch => {}
            _ => {
                tracing::debug!(epoch = self.epoch, "highlight pass is stale");
                return Err(Error::Cancelled);
            }
        }
        Ok(highlight(self, &pass.keywords))
    }

    /// Cancel every pass and drop the laid-out pages.
    pub fn teardown(&mut self) {
        self.teardown.cancel();
        self.pass = None;
        self.pages.clear();
        self.layout.send_replace(LayoutState::Pending);
    }

    pub fn is_torn_down(&self) -> bool {
        self.teardown.is_cancelled()
    }

    pub fn text(&self) -> String {
        self.pages
            .iter()
            .map(|page| page.iter().map(InlineRuns::text).collect::<Vec<_>>().join(" "))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn marker_count(&self) -> usize {
        self.pages.iter().flatten().map(InlineRuns::marker_count).sum()
    }

    pub fn to_html(&self) -> String {
        let mut out = String::from("<div class=\"pdf-viewer\">");
        for (i, page) in self.pages.iter().enumerate() {
            out.push_str(&format!(
                "<div class=\"page\" data-page-number=\"{}\"><div class=\"textLayer\">",
                i + 1
            ));
            for span in page {
                out.push_str("<span>");
                span.write_html(&mut out, false);
                out.push_str("</span>");
            }
            out.push_str("</div></div>");
        }
        out.push_str("</div>");
        out
    }
}

/// A scheduled highlight run over a [`PaginatedView`].
#[derive(Debug)]
pub struct HighlightPass {
    layout: watch::Receiver<LayoutState>,
    token: CancellationToken,
    keywords: KeywordSet,
    epoch: Option<u64>,
}

impl HighlightPass {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Wait until layout is ready, then yield once so layout work queued behind the signal
    /// runs first. Returns the layout epoch the pass will apply to.
    pub async fn wait_for_layout(&mut self) -> Result<u64> {
        loop {
            let state = *self.layout.borrow_and_update();
            if let LayoutState::Ready { epoch, .. } = state {
                tokio::task::yield_now().await;
                if self.token.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                if self.layout.has_changed().unwrap_or(false) {
                    continue;
                }
                self.epoch = Some(epoch);
                return Ok(epoch);
            }
            tokio::select! {
                biased;
                _ = self.token.cancelled() => return Err(Error::Cancelled),
                changed = self.layout.changed() => {
                    if changed.is_err() {
                        return Err(Error::Cancelled);
                    }
                }
            }
        }
    }
}

/// Position of one text run: page, span, run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanLeaf {
    page: usize,
    span: usize,
    run: usize,
}

impl TextSurface for PaginatedView {
    type Leaf = SpanLeaf;

    fn clear_markers(&mut self) -> usize {
        self.pages
            .iter_mut()
            .flatten()
            .map(InlineRuns::clear_markers)
            .sum()
    }

    fn text_leaves(&self) -> Vec<SpanLeaf> {
        let mut out = Vec::new();
        for (page, spans) in self.pages.iter().enumerate() {
            for (span, runs) in spans.iter().enumerate() {
                out.extend(runs.text_run_indices().map(|run| SpanLeaf { page, span, run }));
            }
        }
        out
    }

    fn leaf_text(&self, leaf: SpanLeaf) -> &str {
        self.pages
            .get(leaf.page)
            .and_then(|p| p.get(leaf.span))
            .map(|r| r.run_text(leaf.run))
            .unwrap_or("")
    }

    fn replace_leaf(&mut self, leaf: SpanLeaf, fragments: Vec<Fragment>) {
        if let Some(runs) = self.pages.get_mut(leaf.page).and_then(|p| p.get_mut(leaf.span)) {
            runs.replace_run(leaf.run, fragments);
        }
    }
}
