//! Strip executable content from converter-produced markup.

use crate::markup::MarkupTree;
use serde::Serialize;

/// Elements removed together with their whole subtree.
pub const BLOCKED_ELEMENTS: &[&str] = &["script", "iframe", "object", "embed"];

const URI_ATTRIBUTES: &[&str] = &["href", "src", "xlink:href"];

const SCRIPT_SCHEMES: &[&str] = &["javascript:", "vbscript:", "data:text/html"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SanitizeReport {
    pub elements_removed: usize,
    pub handlers_removed: usize,
    pub uris_removed: usize,
}

impl SanitizeReport {
    pub fn is_clean(&self) -> bool {
        self.elements_removed == 0 && self.handlers_removed == 0 && self.uris_removed == 0
    }
}

/// True when `value` would execute script if followed.
///
/// Case, whitespace and control characters anywhere in the value are ignored, so
/// `" Java\tScript:alert(1)"` is caught.
pub fn is_script_uri(value: &str) -> bool {
    let compact: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .flat_map(char::to_lowercase)
        .collect();
    SCRIPT_SCHEMES.iter().any(|s| compact.starts_with(s))
}

pub fn sanitize_tree(tree: &mut MarkupTree) -> SanitizeReport {
    let mut report = SanitizeReport::default();
    let mut stack = vec![tree.root()];
    while let Some(id) = stack.pop() {
        if tree
            .element_name(id)
            .is_some_and(|name| BLOCKED_ELEMENTS.contains(&name))
        {
            tree.detach(id);
            report.elements_removed += 1;
            continue;
        }
        stack.extend(tree.children(id).iter().rev().copied());
        let mut handlers = 0usize;
        let mut uris = 0usize;
        tree.retain_attrs(id, |k, v| {
            let k = k.to_ascii_lowercase();
            if k.starts_with("on") {
                handlers += 1;
                return false;
            }
            if URI_ATTRIBUTES.contains(&k.as_str()) && is_script_uri(v) {
                uris += 1;
                return false;
            }
            true
        });
        report.handlers_removed += handlers;
        report.uris_removed += uris;
    }
    report
}

/// Parse, sanitize and re-serialize markup.
pub fn sanitize_markup(html: &str) -> (String, SanitizeReport) {
    let mut tree = MarkupTree::parse(html);
    let report = sanitize_tree(&mut tree);
    if !report.is_clean() {
        tracing::debug!(
            elements = report.elements_removed,
            handlers = report.handlers_removed,
            uris = report.uris_removed,
            "sanitized markup"
        );
    }
    (tree.to_html(), report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scripts_handlers_and_script_uris() {
        let (out, report) = sanitize_markup(
            "<p onclick=\"x()\">Hi <a href=\"javascript:alert(1)\">link</a></p><script>alert(2)</script>",
        );
        assert_eq!(out, "<p>Hi <a>link</a></p>");
        assert_eq!(
            report,
            SanitizeReport {
                elements_removed: 1,
                handlers_removed: 1,
                uris_removed: 1,
            }
        );
    }

    #[test]
    fn benign_markup_is_preserved() {
        let html = "<h1>Title</h1><p><strong>b</strong> <a href=\"https://example.com/a?b=1&amp;c=2\">x</a></p><table><tbody><tr><td colspan=\"2\">c</td></tr></tbody></table>";
        let (out, report) = sanitize_markup(html);
        assert!(report.is_clean());
        assert_eq!(out, html);
    }

    #[test]
    fn blocked_elements_lose_their_whole_subtree() {
        let (out, _) = sanitize_markup(
            "<div>a<object data=\"x\"><p>inner</p></object><iframe src=\"x\"></iframe>b</div>",
        );
        assert_eq!(out, "<div>ab</div>");
    }

    #[test]
    fn scheme_detection_ignores_case_whitespace_and_controls() {
        assert!(is_script_uri("JavaScript:alert(1)"));
        assert!(is_script_uri("  java\tscript:alert(1)"));
        assert!(is_script_uri("java\u{0}script:x"));
        assert!(is_script_uri("VBScript:msgbox"));
        assert!(is_script_uri("data:text/html;base64,AAAA"));
        assert!(!is_script_uri("data:image/png;base64,AAAA"));
        assert!(!is_script_uri("https://example.com/javascript:"));
        assert!(!is_script_uri("#section"));
    }

    #[test]
    fn svg_xlink_href_is_checked() {
        let mut tree = MarkupTree::new();
        let root = tree.root();
        tree.append_element(
            root,
            "a",
            vec![("xlink:href".to_string(), "javascript:x".to_string())],
        );
        let report = sanitize_tree(&mut tree);
        assert_eq!(report.uris_removed, 1);
        assert_eq!(tree.to_html(), "<a></a>");
    }
}
