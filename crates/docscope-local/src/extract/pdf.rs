use crate::markup::escape_html;
use docscope_core::{Error, ExtractedContent, Result};

/// Text fragments of every page, in page order.
///
/// `pdf-extract` panics on some malformed files; the panic is caught and reported as an
/// extraction error.
pub fn pdf_page_fragments(bytes: &[u8]) -> Result<Vec<Vec<String>>> {
    let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
        .map_err(|_| Error::Extraction("pdf parser panicked (malformed file)".to_string()))?
        .map_err(|e| Error::Extraction(format!("pdf: {e}")))?;
    Ok(pages
        .iter()
        .map(|page| {
            page.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect()
        })
        .collect())
}

/// Fragments joined by a space within a page, pages joined by a newline.
pub fn join_pages(pages: &[Vec<String>]) -> String {
    pages
        .iter()
        .map(|fragments| fragments.join(" "))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn extract_pdf(bytes: &[u8]) -> Result<ExtractedContent> {
    let pages = pdf_page_fragments(bytes)?;
    let plain_text = join_pages(&pages);
    tracing::debug!(pages = pages.len(), chars = plain_text.len(), "pdf text extracted");
    Ok(ExtractedContent {
        safe_markup: format!("<pre>{}</pre>", escape_html(&plain_text)),
        plain_text,
        error: None,
    })
}
