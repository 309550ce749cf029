//! Best-effort text recovery from legacy `.doc` bytes.

use crate::markup::escape_html;
use docscope_core::{ErrorCode, ExtractedContent};

/// Shorter runs are almost always binary noise.
pub const MIN_RUN_LEN: usize = 3;

fn is_text_byte(b: u8) -> bool {
    matches!(b, 0x20..=0x7e | b'\t' | b'\r' | b'\n')
}

/// Maximal runs of printable ASCII (plus tab/CR/LF) at least [`MIN_RUN_LEN`] bytes long.
pub fn printable_runs(bytes: &[u8]) -> Vec<&str> {
    bytes
        .split(|b| !is_text_byte(*b))
        .filter(|run| run.len() >= MIN_RUN_LEN)
        // Every byte is ASCII, so this never fails.
        .filter_map(|run| std::str::from_utf8(run).ok())
        .collect()
}

/// Scan result flagged with `code` (the low-fidelity code, or the conversion failure cause).
pub fn scan_doc(bytes: &[u8], code: ErrorCode) -> ExtractedContent {
    let plain_text = printable_runs(bytes).join("\n");
    let safe_markup = format!(
        "<div class=\"doc-warning\" role=\"alert\">{}</div><pre>{}</pre>",
        escape_html(code.message()),
        escape_html(&plain_text)
    );
    ExtractedContent {
        safe_markup,
        plain_text,
        error: Some(code),
    }
}
