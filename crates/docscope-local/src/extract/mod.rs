//! Format extractors: raw bytes → [`ExtractedContent`].
//!
//! Every format maps to exactly one extractor. The legacy DOC entry here is the local byte
//! scan only; remote conversion is layered on top by [`crate::ingest`].

pub mod docx;
pub mod grid;
pub mod legacy_doc;
pub mod pdf;
pub mod xlsx;

use crate::markup::escape_html;
use docscope_core::{DocumentFormat, ErrorCode, ExtractedContent, Result};

pub fn extract(format: DocumentFormat, bytes: &[u8]) -> Result<ExtractedContent> {
    match format {
        DocumentFormat::Pdf => pdf::extract_pdf(bytes),
        DocumentFormat::Docx => docx::extract_docx(bytes),
        DocumentFormat::Xlsx => xlsx::extract_xlsx(bytes),
        DocumentFormat::Doc => Ok(legacy_doc::scan_doc(bytes, ErrorCode::DocLowFidelity)),
    }
}

/// Best-effort content for a document whose extractor failed.
pub fn failure_content(name: &str, detail: &str) -> ExtractedContent {
    ExtractedContent {
        safe_markup: format!(
            "<div class=\"doc-error\" role=\"alert\"><p>{}</p><p><code>{}</code></p></div>",
            escape_html(&format!("{} ({name})", ErrorCode::ExtractionFailed.message())),
            escape_html(detail)
        ),
        plain_text: String::new(),
        error: Some(ErrorCode::ExtractionFailed),
    }
}
