//! The viewer session: document collection, query, selection, notices and the live preview.
//!
//! All state lives here and is lent by reference to ranking and highlighting. The collection
//! only grows through ingestion and only shrinks through [`Session::remove`] and
//! [`Session::teardown`]; each removal releases the document's blob exactly once.

use crate::blobs::{BlobStore, ResourceHandle};
use crate::config::ViewerConfig;
use crate::debounce::{debounce, DebounceInput, Debounced};
use crate::highlight::HighlightStats;
use crate::ingest::{extract_file, DocOptions};
use crate::notices::{Notice, NoticeBoard};
use crate::preview::{render_preview, PreviewContent, PreviewPane};
use crate::search::{maintain_selection, rank};
use crate::tokenize::tokenize;
use docscope_core::{
    ConversionBackend, DocumentId, DocumentRecord, Error, KeywordSet, Result,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

pub struct Session {
    config: ViewerConfig,
    docs: Vec<DocumentRecord>,
    blobs: BlobStore,
    handles: HashMap<DocumentId, ResourceHandle>,
    query: String,
    keywords: KeywordSet,
    selected: Option<DocumentId>,
    notices: NoticeBoard,
    preview: PreviewPane,
    converter: Option<Arc<dyn ConversionBackend>>,
}

impl Session {
    pub fn new(config: ViewerConfig) -> Self {
        let notices = NoticeBoard::new(config.notice_ttl);
        Self {
            config,
            docs: Vec::new(),
            blobs: BlobStore::new(),
            handles: HashMap::new(),
            query: String::new(),
            keywords: KeywordSet::empty(),
            selected: None,
            notices,
            preview: PreviewPane::new(),
            converter: None,
        }
    }

    pub fn with_converter(mut self, converter: Arc<dyn ConversionBackend>) -> Self {
        self.converter = Some(converter);
        self
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// Ingest one file. Returns the new document's id, or `None` when the file was rejected
    /// (a notice explains why).
    pub async fn ingest(&mut self, name: &str, bytes: Vec<u8>) -> Option<DocumentId> {
        let doc = DocOptions {
            conversion_enabled: self.config.doc_conversion,
            converter: self.converter.as_deref(),
        };
        let (format, content) = match extract_file(name, &bytes, doc).await {
            Ok(v) => v,
            Err(notice) => {
                self.notices.push(notice);
                return None;
            }
        };
        let handle = self.blobs.insert(bytes);
        let record = DocumentRecord::new(name, format, content, Some(handle.id()));
        let id = record.id();
        tracing::info!(
            doc = %id,
            file = %name,
            %format,
            error = record.error().map(|c| c.as_str()).unwrap_or("none"),
            "document ingested"
        );
        self.handles.insert(id, handle);
        self.docs.push(record);
        let view = rank(&self.docs, &self.keywords, self.config.ranking);
        self.selected = maintain_selection(&view, self.selected.or(Some(id)));
        Some(id)
    }

    /// Read and ingest files one after another. Unreadable files become notices.
    pub async fn ingest_paths<P: AsRef<Path>>(&mut self, paths: &[P]) -> Vec<DocumentId> {
        let mut ids = Vec::new();
        for path in paths {
            let path = path.as_ref();
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            match tokio::fs::read(path).await {
                Ok(bytes) => ids.extend(self.ingest(&name, bytes).await),
                Err(e) => {
                    tracing::warn!(file = %name, error = %e, "file unreadable");
                    self.notices.push(Notice::failed(&name, &e.to_string()));
                }
            }
        }
        ids
    }

    /// Set the query, recompute keywords, and keep the selection inside the new view.
    pub fn set_query(&mut self, query: &str) -> &KeywordSet {
        self.query = query.to_string();
        self.keywords = tokenize(query, self.config.tokenizer);
        let view = rank(&self.docs, &self.keywords, self.config.ranking);
        self.selected = maintain_selection(&view, self.selected);
        &self.keywords
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn keywords(&self) -> &KeywordSet {
        &self.keywords
    }

    /// A debounced query channel seeded with the current query.
    ///
    /// Feed keystrokes into the input; pass each settled value to [`Session::set_query`].
    pub fn query_debouncer(&self) -> (DebounceInput<String>, Debounced<String>) {
        debounce(self.query.clone(), self.config.debounce)
    }

    /// Ranked, filtered view of the collection for the current keywords.
    pub fn view(&self) -> Vec<&DocumentRecord> {
        rank(&self.docs, &self.keywords, self.config.ranking)
    }

    pub fn documents(&self) -> &[DocumentRecord] {
        &self.docs
    }

    pub fn document(&self, id: DocumentId) -> Option<&DocumentRecord> {
        self.docs.iter().find(|d| d.id() == id)
    }

    pub fn document_count(&self) -> usize {
        self.docs.len()
    }

    /// List header text, e.g. "3 documents" or "1 of 3 documents".
    pub fn summary(&self) -> String {
        let total = self.docs.len();
        let noun = if total == 1 { "document" } else { "documents" };
        if self.keywords.is_empty() {
            format!("{total} {noun}")
        } else {
            format!("{} of {total} {noun}", self.view().len())
        }
    }

    /// Select `id` if it is in the current view. Filtered-out documents cannot be selected.
    pub fn select(&mut self, id: DocumentId) -> bool {
        if !self.view().iter().any(|d| d.id() == id) {
            return false;
        }
        self.selected = Some(id);
        true
    }

    /// Select the first document in the current view named `name` (ASCII case-insensitive).
    pub fn select_by_name(&mut self, name: &str) -> Option<DocumentId> {
        let id = self
            .view()
            .iter()
            .find(|d| d.name().eq_ignore_ascii_case(name))
            .map(|d| d.id())?;
        self.selected = Some(id);
        Some(id)
    }

    pub fn selected(&self) -> Option<&DocumentRecord> {
        self.selected.and_then(|id| self.document(id))
    }

    /// Remove a document, tearing down its preview and releasing its blob.
    pub fn remove(&mut self, id: DocumentId) -> Result<()> {
        let pos = self
            .docs
            .iter()
            .position(|d| d.id() == id)
            .ok_or_else(|| Error::NotFound(format!("document {id}")))?;
        if self.preview.current_doc() == Some(id) {
            self.preview.clear();
        }
        if let Some(handle) = self.handles.remove(&id) {
            self.blobs.release(handle)?;
        }
        self.docs.remove(pos);
        let view = rank(&self.docs, &self.keywords, self.config.ranking);
        self.selected = maintain_selection(&view, self.selected);
        Ok(())
    }

    /// Render the selected document into the preview pane and highlight it.
    ///
    /// A load superseded by a newer one returns `Error::Cancelled` and leaves the pane alone.
    pub async fn load_preview(&mut self) -> Result<Option<&PreviewContent>> {
        let Some(record) = self.selected.and_then(|id| self.docs.iter().find(|d| d.id() == id))
        else {
            self.preview.clear();
            return Ok(None);
        };
        let ticket = self.preview.begin(record.id());
        let lease = match record.resource() {
            Some(blob) => match self.blobs.lease(blob) {
                Ok(lease) => Some(lease),
                Err(e) => {
                    tracing::warn!(doc = %record.id(), error = %e, "preview without original bytes");
                    None
                }
            },
            None => None,
        };
        let content = render_preview(record, lease, ticket.token()).await?;
        if !self.preview.install(ticket, content) {
            return Err(Error::Cancelled);
        }
        self.preview.refresh_highlights(&self.keywords).await?;
        Ok(self.preview.current())
    }

    /// Re-highlight the installed preview for the current keywords.
    pub async fn refresh_highlights(&mut self) -> Result<HighlightStats> {
        self.preview.refresh_highlights(&self.keywords).await
    }

    pub fn preview(&self) -> Option<&PreviewContent> {
        self.preview.current()
    }

    pub fn notices(&mut self) -> &[Notice] {
        self.notices.active()
    }

    pub fn dismiss_notices(&mut self) {
        self.notices.dismiss_all();
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// Drop every document and release every blob. Returns the number released.
    pub fn teardown(&mut self) -> usize {
        self.preview.clear();
        let mut released = 0;
        for (id, handle) in self.handles.drain() {
            match self.blobs.release(handle) {
                Ok(()) => released += 1,
                Err(e) => tracing::warn!(doc = %id, error = %e, "blob release failed"),
            }
        }
        self.docs.clear();
        self.selected = None;
        released
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            self.teardown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docscope_core::ErrorCode;

    const DOC_BYTES: &[u8] = b"\x00\x00apple orchard memo\x00\x00";

    #[tokio::test]
    async fn first_document_becomes_the_selection() {
        let mut s = Session::new(ViewerConfig::default());
        let a = s.ingest("a.doc", DOC_BYTES.to_vec()).await.unwrap();
        let _b = s.ingest("b.doc", DOC_BYTES.to_vec()).await.unwrap();
        assert_eq!(s.selected().map(DocumentRecord::id), Some(a));
        assert_eq!(s.document_count(), 2);
        assert_eq!(s.summary(), "2 documents");
    }

    #[tokio::test]
    async fn rejected_files_leave_only_a_notice() {
        let mut s = Session::new(ViewerConfig::default());
        assert!(s.ingest("notes.txt", b"x".to_vec()).await.is_none());
        assert_eq!(s.document_count(), 0);
        assert_eq!(s.blobs().acquired(), 0);
        let notices = s.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].code, ErrorCode::UnsupportedFormat);
    }

    #[tokio::test]
    async fn query_narrows_view_and_moves_selection() {
        let mut s = Session::new(ViewerConfig::default());
        let _plain = s.ingest("plain.doc", b"\x00nothing here\x00".to_vec()).await;
        let apple = s.ingest("orchard.doc", DOC_BYTES.to_vec()).await.unwrap();
        s.set_query("apple");
        assert_eq!(s.view().len(), 1);
        assert_eq!(s.selected().map(DocumentRecord::id), Some(apple));
        assert_eq!(s.summary(), "1 of 2 documents");

        s.set_query("zebra");
        assert!(s.selected().is_none());
    }

    #[tokio::test]
    async fn remove_and_teardown_release_each_blob_once() {
        let mut s = Session::new(ViewerConfig::default());
        let a = s.ingest("a.doc", DOC_BYTES.to_vec()).await.unwrap();
        s.ingest("b.doc", DOC_BYTES.to_vec()).await.unwrap();
        s.ingest("c.doc", DOC_BYTES.to_vec()).await.unwrap();
        s.load_preview().await.unwrap();

        s.remove(a).unwrap();
        assert!(s.preview().is_none());
        assert_eq!(s.blobs().released(), 1);
        assert!(matches!(s.remove(a), Err(Error::NotFound(_))));

        assert_eq!(s.teardown(), 2);
        assert_eq!(s.blobs().acquired(), 3);
        assert_eq!(s.blobs().released(), 3);
        assert_eq!(s.blobs().live_count(), 0);
        assert_eq!(s.teardown(), 0);
    }

    #[tokio::test]
    async fn preview_of_a_doc_is_its_stored_markup_highlighted() {
        let mut s = Session::new(ViewerConfig::default());
        s.ingest("memo.doc", DOC_BYTES.to_vec()).await.unwrap();
        s.set_query("orchard");
        let html = s.load_preview().await.unwrap().map(PreviewContent::to_html).unwrap();
        assert!(html.contains("doc-warning"));
        assert!(html.contains("apple <mark class=\"keyword-highlight\">orchard</mark> memo"));
    }

    #[tokio::test]
    async fn ingest_under_an_active_filter_keeps_selection_in_view() {
        let mut s = Session::new(ViewerConfig::default());
        s.set_query("zebra");
        let a = s.ingest("a.doc", DOC_BYTES.to_vec()).await.unwrap();
        assert!(s.view().is_empty());
        assert!(s.selected().is_none());
        assert!(s.load_preview().await.unwrap().is_none());

        let z = s
            .ingest("z.doc", b"\x00\x00zebra crossing\x00\x00".to_vec())
            .await
            .unwrap();
        assert_eq!(s.selected().map(DocumentRecord::id), Some(z));

        s.set_query("");
        assert_eq!(s.selected().map(DocumentRecord::id), Some(z));
        assert_eq!(s.view().len(), 2);
        assert!(s.document(a).is_some());
    }

    #[tokio::test]
    async fn filtered_out_documents_cannot_be_selected() {
        let mut s = Session::new(ViewerConfig::default());
        let plain = s
            .ingest("plain.doc", b"\x00nothing here\x00".to_vec())
            .await
            .unwrap();
        let apple = s.ingest("orchard.doc", DOC_BYTES.to_vec()).await.unwrap();
        s.set_query("apple");

        assert!(!s.select(plain));
        assert!(s.select_by_name("PLAIN.DOC").is_none());
        assert_eq!(s.selected().map(DocumentRecord::id), Some(apple));
        assert_eq!(s.select_by_name("Orchard.doc"), Some(apple));

        s.set_query("");
        assert!(s.select(plain));
        assert_eq!(s.selected().map(DocumentRecord::id), Some(plain));
    }

    #[tokio::test]
    async fn removing_an_unknown_document_is_not_found() {
        let mut s = Session::new(ViewerConfig::default());
        assert!(matches!(s.remove(DocumentId::new()), Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn dismissing_clears_active_notices() {
        let mut s = Session::new(ViewerConfig::default());
        s.ingest("notes.txt", b"x".to_vec()).await;
        assert_eq!(s.notices().len(), 1);
        s.dismiss_notices();
        assert!(s.notices().is_empty());
    }

    #[tokio::test]
    async fn unreadable_paths_become_notices() {
        let mut s = Session::new(ViewerConfig::default());
        let ids = s
            .ingest_paths(&["/definitely/not/here/report.pdf"])
            .await;
        assert!(ids.is_empty());
        let notices = s.notices();
        assert_eq!(notices[0].code, ErrorCode::ReadFailed);
        assert!(notices[0].message.starts_with("Failed to process report.pdf: "));
    }
}
