//! Preview rendering for the selected document, and the pane that owns the live preview.

use crate::blobs::BlobLease;
use crate::extract::docx::docx_to_html;
use crate::extract::grid::SheetGrid;
use crate::extract::xlsx::read_workbook;
use crate::highlight::{highlight, HighlightStats};
use crate::markup::{escape_html, MarkupTree};
use crate::sanitize::sanitize_tree;
use crate::text_layer::PaginatedView;
use docscope_core::{DocumentFormat, DocumentId, DocumentRecord, Error, KeywordSet, Result};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub enum PreviewContent {
    Markup(MarkupTree),
    Paginated(PaginatedView),
    Grid(SheetGrid),
    /// The renderer could not handle the fetched bytes. The stored record is unaffected.
    Failed { message: String },
}

impl PreviewContent {
    fn failed(format: DocumentFormat) -> Self {
        let kind = match format {
            DocumentFormat::Pdf => "PDF",
            DocumentFormat::Docx => "DOCX",
            DocumentFormat::Xlsx => "XLSX",
            DocumentFormat::Doc => "DOC",
        };
        Self::Failed {
            message: format!("Failed to load {kind}."),
        }
    }

    pub fn to_html(&self) -> String {
        match self {
            Self::Markup(tree) => tree.to_html(),
            Self::Paginated(view) => view.to_html(),
            Self::Grid(grid) => grid.to_html(),
            Self::Failed { message } => format!(
                "<div class=\"render-error\" role=\"alert\">{}</div>",
                escape_html(message)
            ),
        }
    }

    pub fn marker_count(&self) -> usize {
        match self {
            Self::Markup(tree) => tree.marker_count(),
            Self::Paginated(view) => view.marker_count(),
            Self::Grid(grid) => grid.marker_count(),
            Self::Failed { .. } => 0,
        }
    }

    fn teardown(&mut self) {
        if let Self::Paginated(view) = self {
            view.teardown();
        }
    }
}

/// Build the preview for `record`.
///
/// PDF, DOCX and XLSX re-render from the original bytes; DOC (and any record without bytes)
/// shows its stored markup. Only cancellation is an error.
pub async fn render_preview(
    record: &DocumentRecord,
    blob: Option<BlobLease>,
    token: &CancellationToken,
) -> Result<PreviewContent> {
    let Some(bytes) = blob else {
        return Ok(PreviewContent::Markup(MarkupTree::parse(record.safe_markup())));
    };
    let format = record.format();
    let rendered = match format {
        DocumentFormat::Pdf => {
            let mut view = PaginatedView::new(token);
            match view.load(&bytes).await {
                Ok(()) => Ok(PreviewContent::Paginated(view)),
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => Err(e),
            }
        }
        DocumentFormat::Docx => docx_to_html(&bytes).map(|html| {
            let mut tree = MarkupTree::parse(&html);
            sanitize_tree(&mut tree);
            PreviewContent::Markup(tree)
        }),
        DocumentFormat::Xlsx => {
            read_workbook(&bytes).map(|wb| PreviewContent::Grid(SheetGrid::from_workbook(&wb)))
        }
        DocumentFormat::Doc => Ok(PreviewContent::Markup(MarkupTree::parse(record.safe_markup()))),
    };
    if token.is_cancelled() {
        return Err(Error::Cancelled);
    }
    Ok(rendered.unwrap_or_else(|e| {
        tracing::warn!(doc = %record.id(), %format, error = %e, "preview render failed");
        PreviewContent::failed(format)
    }))
}

/// Claim on the pane for one preview load. Superseded tickets are cancelled.
#[derive(Debug)]
pub struct PreviewTicket {
    doc: DocumentId,
    generation: u64,
    token: CancellationToken,
}

impl PreviewTicket {
    pub fn doc(&self) -> DocumentId {
        self.doc
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

#[derive(Debug)]
struct Installed {
    doc: DocumentId,
    content: PreviewContent,
    token: CancellationToken,
}

/// The single live preview. Loads are ticketed so a stale load never replaces a newer one.
#[derive(Debug, Default)]
pub struct PreviewPane {
    root: CancellationToken,
    generation: u64,
    pending: Option<CancellationToken>,
    current: Option<Installed>,
}

impl PreviewPane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start loading `doc`, cancelling any load still in flight and any pass on the current
    /// preview.
    pub fn begin(&mut self, doc: DocumentId) -> PreviewTicket {
        if let Some(prev) = self.pending.take() {
            prev.cancel();
        }
        if let Some(Installed {
            content: PreviewContent::Paginated(view),
            ..
        }) = self.current.as_mut()
        {
            view.cancel_pass();
        }
        self.generation += 1;
        let token = self.root.child_token();
        self.pending = Some(token.clone());
        PreviewTicket {
            doc,
            generation: self.generation,
            token,
        }
    }

    /// Install `content` if `ticket` is still the newest load. Returns whether it was installed.
    pub fn install(&mut self, ticket: PreviewTicket, mut content: PreviewContent) -> bool {
        if ticket.generation != self.generation || ticket.token.is_cancelled() {
            tracing::debug!(doc = %ticket.doc, "discarding superseded preview");
            content.teardown();
            return false;
        }
        self.pending = None;
        self.replace(Some(Installed {
            doc: ticket.doc,
            content,
            token: ticket.token,
        }));
        true
    }

    /// Tear down the current preview and cancel any load in flight.
    pub fn clear(&mut self) {
        if let Some(prev) = self.pending.take() {
            prev.cancel();
        }
        self.generation += 1;
        self.replace(None);
    }

    fn replace(&mut self, next: Option<Installed>) {
        if let Some(mut old) = std::mem::replace(&mut self.current, next) {
            old.content.teardown();
            old.token.cancel();
        }
    }

    pub fn current(&self) -> Option<&PreviewContent> {
        self.current.as_ref().map(|i| &i.content)
    }

    pub fn current_doc(&self) -> Option<DocumentId> {
        self.current.as_ref().map(|i| i.doc)
    }

    /// Re-highlight the current preview for `keywords`.
    pub async fn refresh_highlights(&mut self, keywords: &KeywordSet) -> Result<HighlightStats> {
        let Some(installed) = self.current.as_mut() else {
            return Ok(HighlightStats::default());
        };
        match &mut installed.content {
            PreviewContent::Markup(tree) => Ok(highlight(tree, keywords)),
            PreviewContent::Grid(grid) => Ok(highlight(grid, keywords)),
            PreviewContent::Paginated(view) => {
                let mut pass = view.schedule_highlight(keywords);
                pass.wait_for_layout().await?;
                view.apply(&pass)
            }
            PreviewContent::Failed { .. } => Ok(HighlightStats::default()),
        }
    }
}
