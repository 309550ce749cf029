//! Owned HTML tree for rendered previews.
//!
//! Converter output and stored `safe_markup` are parsed into this arena so the sanitizer and
//! the highlight engine can rewrite it in place and serialize it back. Parsing goes through
//! `scraper` (html5ever), so malformed markup is repaired the way a browser would.

use crate::highlight::{Fragment, TextSurface, MARKER_CLASS, MARKER_TAG};
use html_scraper::{ElementRef, Html, Node as HtmlNode};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

const BLOCK_ELEMENTS: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "caption",
    "dd",
    "div",
    "dl",
    "dt",
    "figure",
    "footer",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "hr",
    "li",
    "ol",
    "p",
    "pre",
    "section",
    "table",
    "tbody",
    "tfoot",
    "thead",
    "tr",
    "ul",
];

/// Escape text for inclusion in HTML element content or attribute values.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn escape_text_into(s: &str, out: &mut String) {
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}

fn escape_attr_into(s: &str, out: &mut String) {
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeData {
    Root,
    Element {
        name: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct MarkupTree {
    nodes: Vec<Node>,
}

impl Default for MarkupTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkupTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                data: NodeData::Root,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// Parse an HTML fragment. Comments, doctypes and processing instructions are dropped.
    pub fn parse(html: &str) -> Self {
        let doc = Html::parse_fragment(html);
        let mut tree = Self::new();
        let root = tree.root();
        tree.import_children(doc.root_element(), root);
        tree
    }

    fn import_children(&mut self, el: ElementRef<'_>, parent: NodeId) {
        for child in el.children() {
            match child.value() {
                HtmlNode::Text(t) => {
                    self.append_text(parent, &**t);
                }
                HtmlNode::Element(e) => {
                    let attrs = e
                        .attrs()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect();
                    let id = self.append_element(parent, e.name(), attrs);
                    if let Some(child_el) = ElementRef::wrap(child) {
                        self.import_children(child_el, id);
                    }
                }
                _ => {}
            }
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn push(&mut self, data: NodeData, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            data,
            parent,
            children: Vec::new(),
        });
        id
    }

    pub fn append_element(
        &mut self,
        parent: NodeId,
        name: &str,
        attrs: Vec<(String, String)>,
    ) -> NodeId {
        let id = self.push(
            NodeData::Element {
                name: name.to_ascii_lowercase(),
                attrs,
            },
            Some(parent),
        );
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        let id = self.push(NodeData::Text(text.to_string()), Some(parent));
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn element_name(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].data {
            NodeData::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn attr(&self, id: NodeId, key: &str) -> Option<&str> {
        match &self.nodes[id.0].data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].data {
            NodeData::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Attached nodes in document (pre-)order, starting at `from`.
    pub fn descendants(&self, from: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            out.push(id);
            for &c in self.nodes[id.0].children.iter().rev() {
                stack.push(c);
            }
        }
        out
    }

    pub fn elements_named(&self, name: &str) -> Vec<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .filter(|&id| self.element_name(id) == Some(name))
            .collect()
    }

    /// Remove a node (and its subtree) from its parent.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    pub(crate) fn retain_attrs<F>(&mut self, id: NodeId, mut keep: F) -> usize
    where
        F: FnMut(&str, &str) -> bool,
    {
        match &mut self.nodes[id.0].data {
            NodeData::Element { attrs, .. } => {
                let before = attrs.len();
                attrs.retain(|(k, v)| keep(k, v));
                before - attrs.len()
            }
            _ => 0,
        }
    }

    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        for n in self.descendants(id) {
            if let NodeData::Text(t) = &self.nodes[n.0].data {
                out.push_str(t);
            }
        }
        out
    }

    /// Flattened text for search: block elements end lines, table cells are tab-separated.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        self.flatten_into(self.root(), &mut out);
        let mut lines: Vec<&str> = Vec::new();
        let mut blank_run = 0usize;
        for line in out.lines().map(str::trim_end) {
            if line.is_empty() {
                blank_run += 1;
                if blank_run > 1 {
                    continue;
                }
            } else {
                blank_run = 0;
            }
            lines.push(line);
        }
        lines.join("\n").trim().to_string()
    }

    fn flatten_into(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id.0].data {
            NodeData::Text(t) => out.push_str(t),
            NodeData::Root => {
                for &c in &self.nodes[id.0].children {
                    self.flatten_into(c, out);
                }
            }
            NodeData::Element { name, .. } => {
                let name = name.as_str();
                if matches!(name, "script" | "style") {
                    return;
                }
                if name == "br" {
                    out.push('\n');
                    return;
                }
                let block = BLOCK_ELEMENTS.contains(&name);
                if block && !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                for &c in &self.nodes[id.0].children {
                    self.flatten_into(c, out);
                }
                if matches!(name, "td" | "th") {
                    out.push('\t');
                }
                if block && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
        }
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for &c in &self.nodes[0].children {
            self.write_node(c, &mut out);
        }
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id.0].data {
            NodeData::Root => {
                for &c in &self.nodes[id.0].children {
                    self.write_node(c, out);
                }
            }
            NodeData::Text(t) => escape_text_into(t, out),
            NodeData::Element { name, attrs } => {
                out.push('<');
                out.push_str(name);
                for (k, v) in attrs {
                    out.push(' ');
                    out.push_str(k);
                    out.push_str("=\"");
                    escape_attr_into(v, out);
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&name.as_str()) {
                    return;
                }
                for &c in &self.nodes[id.0].children {
                    self.write_node(c, out);
                }
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
        }
    }

    fn is_marker(&self, id: NodeId) -> bool {
        self.element_name(id) == Some(MARKER_TAG)
            && self
                .attr(id, "class")
                .is_some_and(|c| c.split_ascii_whitespace().any(|c| c == MARKER_CLASS))
    }

    pub fn marker_count(&self) -> usize {
        self.descendants(self.root())
            .into_iter()
            .filter(|&id| self.is_marker(id))
            .count()
    }

    /// True if any marker has another marker among its descendants.
    pub fn has_nested_markers(&self) -> bool {
        self.descendants(self.root())
            .into_iter()
            .filter(|&id| self.is_marker(id))
            .any(|m| {
                self.descendants(m)
                    .into_iter()
                    .skip(1)
                    .any(|d| self.is_marker(d))
            })
    }

    /// Merge adjacent text children and drop empty ones.
    fn normalize(&mut self, parent: NodeId) {
        let children = std::mem::take(&mut self.nodes[parent.0].children);
        let mut merged: Vec<NodeId> = Vec::with_capacity(children.len());
        for c in children {
            let Some(text) = self.text(c).map(str::to_string) else {
                merged.push(c);
                continue;
            };
            if text.is_empty() {
                self.nodes[c.0].parent = None;
                continue;
            }
            if let Some(&prev) = merged.last() {
                if let NodeData::Text(prev_text) = &mut self.nodes[prev.0].data {
                    prev_text.push_str(&text);
                    self.nodes[c.0].parent = None;
                    continue;
                }
            }
            merged.push(c);
        }
        self.nodes[parent.0].children = merged;
    }

    /// Drop unreachable nodes and renumber the rest in document order. Invalidates every
    /// outstanding `NodeId` except the root.
    fn compact(&mut self) {
        let order = self.descendants(self.root());
        if order.len() == self.nodes.len() {
            return;
        }
        let mut remap = vec![usize::MAX; self.nodes.len()];
        for (new, old) in order.iter().enumerate() {
            remap[old.0] = new;
        }
        let mut old_nodes: Vec<Option<Node>> =
            std::mem::take(&mut self.nodes).into_iter().map(Some).collect();
        let mut nodes = Vec::with_capacity(order.len());
        for old in order {
            let Some(mut node) = old_nodes[old.0].take() else {
                continue;
            };
            node.parent = node.parent.map(|p| NodeId(remap[p.0]));
            for c in &mut node.children {
                *c = NodeId(remap[c.0]);
            }
            nodes.push(node);
        }
        self.nodes = nodes;
    }

    fn marker_node(&mut self, parent: NodeId, text: &str) -> NodeId {
        let mark = self.push(
            NodeData::Element {
                name: MARKER_TAG.to_string(),
                attrs: vec![("class".to_string(), MARKER_CLASS.to_string())],
            },
            Some(parent),
        );
        let t = self.push(NodeData::Text(text.to_string()), Some(mark));
        self.nodes[mark.0].children.push(t);
        mark
    }
}

impl TextSurface for MarkupTree {
    type Leaf = NodeId;

    fn clear_markers(&mut self) -> usize {
        let markers: Vec<NodeId> = self
            .descendants(self.root())
            .into_iter()
            .filter(|&id| self.is_marker(id))
            .collect();
        let mut touched: Vec<NodeId> = Vec::new();
        let mut cleared = 0usize;
        for m in markers {
            // An inner marker of an already-unwrapped one is gone with its parent.
            let Some(parent) = self.nodes[m.0].parent else {
                continue;
            };
            let text = self.text_content(m);
            let replacement = self.push(NodeData::Text(text), Some(parent));
            if let Some(pos) = self.nodes[parent.0].children.iter().position(|&c| c == m) {
                self.nodes[parent.0].children[pos] = replacement;
            }
            self.nodes[m.0].parent = None;
            for d in self.descendants(m) {
                if self.is_marker(d) {
                    self.nodes[d.0].parent = None;
                }
            }
            if !touched.contains(&parent) {
                touched.push(parent);
            }
            cleared += 1;
        }
        for p in touched {
            self.normalize(p);
        }
        self.compact();
        cleared
    }

    fn text_leaves(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            match &self.nodes[id.0].data {
                NodeData::Text(t) => {
                    if !t.is_empty() {
                        out.push(id);
                    }
                }
                NodeData::Element { name, .. } if matches!(name.as_str(), "script" | "style") => {}
                _ => {
                    for &c in self.nodes[id.0].children.iter().rev() {
                        stack.push(c);
                    }
                }
            }
        }
        out
    }

    fn leaf_text(&self, leaf: NodeId) -> &str {
        self.text(leaf).unwrap_or("")
    }

    fn replace_leaf(&mut self, leaf: NodeId, fragments: Vec<Fragment>) {
        let Some(parent) = self.nodes[leaf.0].parent else {
            return;
        };
        let mut replacement = Vec::with_capacity(fragments.len());
        for f in fragments {
            let id = match f {
                Fragment::Text(t) => self.push(NodeData::Text(t), Some(parent)),
                Fragment::Marker(t) => self.marker_node(parent, &t),
            };
            replacement.push(id);
        }
        if let Some(pos) = self.nodes[parent.0].children.iter().position(|&c| c == leaf) {
            self.nodes[parent.0].children.splice(pos..=pos, replacement);
            self.nodes[leaf.0].parent = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_serialize_keeps_structure_and_escapes() {
        let t = MarkupTree::parse("<p class=\"x\">a &amp; b<br>c</p><ul><li>one</li></ul>");
        assert_eq!(
            t.to_html(),
            "<p class=\"x\">a &amp; b<br>c</p><ul><li>one</li></ul>"
        );
    }

    #[test]
    fn plain_text_breaks_blocks_and_tabs_cells() {
        let t = MarkupTree::parse(
            "<h1>Title</h1><p>First <strong>bold</strong></p><table><tr><td>a</td><td>b</td></tr></table>",
        );
        assert_eq!(t.plain_text(), "Title\nFirst bold\na\tb");
    }

    #[test]
    fn escape_html_covers_markup_characters() {
        assert_eq!(
            escape_html("<a href=\"x\">&'"),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#39;"
        );
    }

    #[test]
    fn replace_then_clear_restores_single_text_node() {
        let mut t = MarkupTree::parse("<p>hello world</p>");
        let leaf = t.text_leaves()[0];
        t.replace_leaf(
            leaf,
            vec![
                Fragment::Text("hello ".to_string()),
                Fragment::Marker("world".to_string()),
            ],
        );
        assert_eq!(
            t.to_html(),
            "<p>hello <mark class=\"keyword-highlight\">world</mark></p>"
        );
        assert_eq!(t.clear_markers(), 1);
        assert_eq!(t.to_html(), "<p>hello world</p>");
        let p = t.elements_named("p")[0];
        assert_eq!(t.children(p).len(), 1);
    }

    #[test]
    fn repeated_passes_do_not_grow_the_arena() {
        use crate::highlight::highlight;
        use docscope_core::KeywordSet;

        let mut t = MarkupTree::parse("<p>alpha beta alpha gamma alpha</p><p>beta</p>");
        let keywords = KeywordSet::from_terms(["alpha", "beta"]);
        let first = highlight(&mut t, &keywords);
        assert_eq!(first.markers, 5);
        let html = t.to_html();
        let len = t.nodes.len();
        for _ in 0..100 {
            let stats = highlight(&mut t, &keywords);
            assert_eq!(stats.cleared, 5);
            assert_eq!(stats.markers, 5);
        }
        assert_eq!(t.nodes.len(), len);
        assert_eq!(t.to_html(), html);

        highlight(&mut t, &KeywordSet::empty());
        assert_eq!(t.to_html(), "<p>alpha beta alpha gamma alpha</p><p>beta</p>");
        assert_eq!(t.nodes.len(), t.descendants(t.root()).len());
    }

    #[test]
    fn detached_subtrees_are_reclaimed_on_clear() {
        let mut t = MarkupTree::parse("<p>keep</p><script>drop()</script>");
        let script = t.elements_named("script")[0];
        t.detach(script);
        t.clear_markers();
        assert_eq!(t.nodes.len(), t.descendants(t.root()).len());
        assert_eq!(t.to_html(), "<p>keep</p>");
    }
}
