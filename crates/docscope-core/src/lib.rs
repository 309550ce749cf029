use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("extraction failed: {0}")]
    Extraction(String),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    #[error("render failed: {0}")]
    Render(String),
    #[error("resource released: {0}")]
    ResourceReleased(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid keyword pattern: {0}")]
    Pattern(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failures of the remote `.doc` conversion service.
///
/// Callers only branch on success vs failure; the variant picks the log line and notice.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("conversion service misconfigured: {0}")]
    NotConfigured(String),
    #[error("conversion job rejected: {0}")]
    Rejected(String),
    #[error("conversion timed out after {waited_ms}ms")]
    TimedOut { waited_ms: u64 },
    #[error("conversion job failed: {0}")]
    JobFailed(String),
    #[error("conversion transport error: {0}")]
    Transport(String),
}

/// The closed set of formats the viewer accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Doc,
    Xlsx,
}

impl DocumentFormat {
    pub const ALL: [DocumentFormat; 4] = [Self::Pdf, Self::Docx, Self::Doc, Self::Xlsx];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Doc => "doc",
            Self::Xlsx => "xlsx",
        }
    }

    /// Resolve a format from a file name by its last extension (ASCII case-insensitive).
    pub fn from_file_name(name: &str) -> Option<Self> {
        let (_, ext) = name.rsplit_once('.')?;
        match ext.trim().to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "doc" => Some(Self::Doc),
            "xlsx" => Some(Self::Xlsx),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(uuid::Uuid);

impl DocumentId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque identifier of a byte blob owned by the session's blob store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobId(pub u64);

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "blob:{}", self.0)
    }
}

/// Stable, machine-readable codes attached to records and notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    UnsupportedFormat,
    ReadFailed,
    ExtractionFailed,
    DocLowFidelity,
    DocConversionDisabled,
    DocConversionFailed,
    RenderFailed,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnsupportedFormat => "unsupported_format",
            Self::ReadFailed => "read_failed",
            Self::ExtractionFailed => "extraction_failed",
            Self::DocLowFidelity => "doc_low_fidelity",
            Self::DocConversionDisabled => "doc_conversion_disabled",
            Self::DocConversionFailed => "doc_conversion_failed",
            Self::RenderFailed => "render_failed",
        }
    }

    /// Human-readable banner text for the preview header.
    pub fn message(self) -> &'static str {
        match self {
            Self::UnsupportedFormat => "This file format is not supported.",
            Self::ReadFailed => "The file could not be read.",
            Self::ExtractionFailed => "The document could not be parsed; showing what was recovered.",
            Self::DocLowFidelity => {
                "Legacy .doc text was recovered with a best-effort scan; formatting is lost."
            }
            Self::DocConversionDisabled => {
                "Remote .doc conversion is disabled; showing a best-effort text scan."
            }
            Self::DocConversionFailed => {
                "Remote .doc conversion failed; showing a best-effort text scan."
            }
            Self::RenderFailed => "The preview could not be rendered.",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of a format extractor before it is stamped into a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedContent {
    pub safe_markup: String,
    pub plain_text: String,
    pub error: Option<ErrorCode>,
}

/// One ingested file after extraction.
///
/// Fields are read-only after construction; the highlight pipeline only ever sees
/// rendered copies of `safe_markup`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentRecord {
    id: DocumentId,
    name: String,
    format: DocumentFormat,
    safe_markup: String,
    plain_text: String,
    error: Option<ErrorCode>,
    resource: Option<BlobId>,
}

impl DocumentRecord {
    pub fn new(
        name: impl Into<String>,
        format: DocumentFormat,
        content: ExtractedContent,
        resource: Option<BlobId>,
    ) -> Self {
        Self {
            id: DocumentId::new(),
            name: name.into(),
            format,
            safe_markup: content.safe_markup,
            plain_text: content.plain_text,
            error: content.error,
            resource,
        }
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn format(&self) -> DocumentFormat {
        self.format
    }

    pub fn safe_markup(&self) -> &str {
        &self.safe_markup
    }

    pub fn plain_text(&self) -> &str {
        &self.plain_text
    }

    pub fn error(&self) -> Option<ErrorCode> {
        self.error
    }

    pub fn resource(&self) -> Option<BlobId> {
        self.resource
    }
}

/// Ordered, distinct, non-empty search terms derived from a query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeywordSet(Vec<String>);

impl KeywordSet {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Trim terms, drop empties, and drop case-insensitive duplicates (first spelling wins).
    pub fn from_terms<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen: Vec<String> = Vec::new();
        let mut out: Vec<String> = Vec::new();
        for t in terms {
            let t = t.as_ref().trim();
            if t.is_empty() {
                continue;
            }
            let key = t.to_lowercase();
            if seen.contains(&key) {
                continue;
            }
            seen.push(key);
            out.push(t.to_string());
        }
        Self(out)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn terms(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenizerMode {
    #[default]
    MultiTerm,
    ExactPhrase,
}

impl FromStr for TokenizerMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "multi-term" | "multi_term" | "multi" => Ok(Self::MultiTerm),
            "exact-phrase" | "exact_phrase" | "phrase" => Ok(Self::ExactPhrase),
            other => Err(Error::NotConfigured(format!(
                "unknown tokenizer mode {other:?} (allowed: multi-term, exact-phrase)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RankingPolicy {
    #[default]
    Ranked,
    Boolean,
}

impl FromStr for RankingPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ranked" | "rank" => Ok(Self::Ranked),
            "boolean" | "bool" | "filter" => Ok(Self::Boolean),
            other => Err(Error::NotConfigured(format!(
                "unknown ranking policy {other:?} (allowed: ranked, boolean)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    #[default]
    Docx,
    Pdf,
}

impl FromStr for TargetFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "docx" => Ok(Self::Docx),
            "pdf" => Ok(Self::Pdf),
            other => Err(Error::NotConfigured(format!(
                "unknown conversion target {other:?} (allowed: docx, pdf)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionRequest {
    pub filename: String,
    /// Source bytes, standard base64.
    pub base64: String,
    pub output_format: TargetFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOutcome {
    pub url: String,
    /// Output file name reported by the service, when present.
    pub output: Option<String>,
}

#[async_trait::async_trait]
pub trait ConversionBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Submit a job and wait for a terminal state; returns the download location.
    async fn convert(
        &self,
        req: &ConversionRequest,
    ) -> std::result::Result<ConversionOutcome, ConversionError>;

    async fn download(
        &self,
        outcome: &ConversionOutcome,
    ) -> std::result::Result<Vec<u8>, ConversionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_is_resolved_from_last_extension_ignoring_case() {
        assert_eq!(
            DocumentFormat::from_file_name("Report.Final.PDF"),
            Some(DocumentFormat::Pdf)
        );
        assert_eq!(
            DocumentFormat::from_file_name("a.docx"),
            Some(DocumentFormat::Docx)
        );
        assert_eq!(DocumentFormat::from_file_name("a.doc"), Some(DocumentFormat::Doc));
        assert_eq!(
            DocumentFormat::from_file_name("book.XLSX"),
            Some(DocumentFormat::Xlsx)
        );
        assert_eq!(DocumentFormat::from_file_name("notes.txt"), None);
        assert_eq!(DocumentFormat::from_file_name("no_extension"), None);
        assert_eq!(DocumentFormat::from_file_name("archive.xlsx.zip"), None);
    }

    #[test]
    fn keyword_set_drops_blank_and_case_insensitive_duplicates() {
        let k = KeywordSet::from_terms(["Apple", " ", "apple", "pear ", "APPLE"]);
        assert_eq!(k.terms(), &["Apple".to_string(), "pear".to_string()]);
    }

    #[test]
    fn error_codes_serialize_as_snake_case() {
        let s = serde_json::to_string(&ErrorCode::DocConversionDisabled).unwrap();
        assert_eq!(s, "\"doc_conversion_disabled\"");
        assert_eq!(ErrorCode::DocConversionFailed.as_str(), "doc_conversion_failed");
    }

    #[test]
    fn records_get_distinct_ids() {
        let a = DocumentRecord::new("a.pdf", DocumentFormat::Pdf, ExtractedContent::default(), None);
        let b = DocumentRecord::new("a.pdf", DocumentFormat::Pdf, ExtractedContent::default(), None);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn policies_parse_from_config_strings() {
        assert_eq!(
            "exact-phrase".parse::<TokenizerMode>().unwrap(),
            TokenizerMode::ExactPhrase
        );
        assert_eq!("BOOLEAN".parse::<RankingPolicy>().unwrap(), RankingPolicy::Boolean);
        assert!("fuzzy".parse::<RankingPolicy>().is_err());
    }

    #[test]
    fn conversion_request_uses_camel_case_wire_names() {
        let req = ConversionRequest {
            filename: "a.doc".to_string(),
            base64: "AAA=".to_string(),
            output_format: TargetFormat::Docx,
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["outputFormat"], "docx");
        assert_eq!(v["filename"], "a.doc");
    }
}
