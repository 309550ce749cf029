//! Ingestion boundary: one file's bytes in, either extracted content or a batch notice out.
//!
//! Nothing here fails the batch. Extractor errors become an error banner on the record, and
//! `.doc` conversion problems degrade to the local byte scan.

use crate::extract::{self, docx::extract_docx, failure_content, legacy_doc::scan_doc};
use crate::notices::Notice;
use base64::Engine as _;
use docscope_core::{
    ConversionBackend, ConversionError, ConversionOutcome, ConversionRequest, DocumentFormat,
    ErrorCode, ExtractedContent, TargetFormat,
};

/// How legacy `.doc` files are handled.
#[derive(Clone, Copy, Default)]
pub struct DocOptions<'a> {
    pub conversion_enabled: bool,
    pub converter: Option<&'a dyn ConversionBackend>,
}

/// Resolve the format of `name` and extract `bytes`.
///
/// `Err` carries the notice for a rejected file; the file must not enter the collection.
pub async fn extract_file(
    name: &str,
    bytes: &[u8],
    doc: DocOptions<'_>,
) -> Result<(DocumentFormat, ExtractedContent), Notice> {
    let Some(format) = DocumentFormat::from_file_name(name) else {
        tracing::warn!(file = %name, "unsupported format");
        return Err(Notice::unsupported(name));
    };
    let content = match format {
        DocumentFormat::Doc => extract_legacy_doc(name, bytes, doc).await,
        _ => match extract::extract(format, bytes) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(file = %name, %format, error = %e, "extraction failed");
                failure_content(name, &e.to_string())
            }
        },
    };
    Ok((format, content))
}

async fn extract_legacy_doc(name: &str, bytes: &[u8], doc: DocOptions<'_>) -> ExtractedContent {
    if !doc.conversion_enabled {
        return scan_doc(bytes, ErrorCode::DocConversionDisabled);
    }
    let Some(converter) = doc.converter else {
        tracing::warn!(file = %name, "doc conversion enabled but no service configured");
        return scan_doc(bytes, ErrorCode::DocConversionFailed);
    };
    match convert_doc(name, bytes, converter).await {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!(file = %name, backend = converter.name(), error = %e, "doc conversion failed");
            scan_doc(bytes, ErrorCode::DocConversionFailed)
        }
    }
}

/// Submit `bytes` for conversion, wait for the job, and download the result.
pub async fn convert_bytes(
    name: &str,
    bytes: &[u8],
    target: TargetFormat,
    converter: &dyn ConversionBackend,
) -> Result<(ConversionOutcome, Vec<u8>), ConversionError> {
    let req = ConversionRequest {
        filename: name.to_string(),
        base64: base64::engine::general_purpose::STANDARD.encode(bytes),
        output_format: target,
    };
    let outcome = converter.convert(&req).await?;
    let converted = converter.download(&outcome).await?;
    tracing::debug!(file = %name, bytes = converted.len(), "conversion downloaded");
    Ok((outcome, converted))
}

/// Convert a `.doc` to `.docx` remotely and extract the result.
pub async fn convert_doc(
    name: &str,
    bytes: &[u8],
    converter: &dyn ConversionBackend,
) -> Result<ExtractedContent, ConversionError> {
    let (_, converted) = convert_bytes(name, bytes, TargetFormat::Docx, converter).await?;
    extract_docx(&converted)
        .map_err(|e| ConversionError::JobFailed(format!("converted output unreadable: {e}")))
}
