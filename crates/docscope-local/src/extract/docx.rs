//! DOCX → structural HTML (paragraphs, headings, lists, runs, links, tables).

use crate::markup::{escape_html, MarkupTree};
use crate::ooxml::{self, attr, toggle_on, Package};
use crate::sanitize::sanitize_markup;
use docscope_core::{ExtractedContent, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;

pub fn extract_docx(bytes: &[u8]) -> Result<ExtractedContent> {
    let html = docx_to_html(bytes)?;
    let (safe_markup, report) = sanitize_markup(&html);
    if !report.is_clean() {
        tracing::warn!(
            elements = report.elements_removed,
            handlers = report.handlers_removed,
            uris = report.uris_removed,
            "docx markup sanitized"
        );
    }
    let plain_text = MarkupTree::parse(&safe_markup).plain_text();
    Ok(ExtractedContent {
        safe_markup,
        plain_text,
        error: None,
    })
}

/// Unsanitized conversion; callers must sanitize before display.
pub fn docx_to_html(bytes: &[u8]) -> Result<String> {
    let mut pkg = ooxml::open_package(bytes)?;
    let document = ooxml::require_part(&mut pkg, "word/document.xml")?;
    let ctx = DocxContext::load(&mut pkg)?;

    let mut w = BodyWriter::new(&ctx);
    let mut reader = Reader::from_str(&document);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => w.start(&e),
            Ok(Event::Empty(e)) => {
                w.start(&e);
                w.end(e.local_name().as_ref());
            }
            Ok(Event::End(e)) => w.end(e.local_name().as_ref()),
            Ok(Event::Text(t)) => {
                if w.collecting_text() {
                    let text = t
                        .unescape()
                        .map_err(|e| ooxml::xml_error("word/document.xml", e))?;
                    w.text(&text);
                }
            }
            Ok(Event::CData(t)) => {
                if w.collecting_text() {
                    w.text(&String::from_utf8_lossy(&t));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ooxml::xml_error("word/document.xml", e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(w.finish())
}

struct DocxContext {
    rels: HashMap<String, String>,
    heading_styles: HashMap<String, u8>,
    /// numId → abstractNumId
    nums: HashMap<String, String>,
    /// (abstractNumId, ilvl) → ordered
    levels: HashMap<(String, u32), bool>,
}

impl DocxContext {
    fn load(pkg: &mut Package<'_>) -> Result<Self> {
        let rels = match ooxml::read_part(pkg, "word/_rels/document.xml.rels")? {
            Some(xml) => ooxml::parse_relationships(&xml)?,
            None => HashMap::new(),
        };
        let heading_styles = match ooxml::read_part(pkg, "word/styles.xml")? {
            Some(xml) => parse_heading_styles(&xml)?,
            None => HashMap::new(),
        };
        let (nums, levels) = match ooxml::read_part(pkg, "word/numbering.xml")? {
            Some(xml) => parse_numbering(&xml)?,
            None => (HashMap::new(), HashMap::new()),
        };
        Ok(Self {
            rels,
            heading_styles,
            nums,
            levels,
        })
    }

    fn heading_level(&self, style_id: &str) -> Option<u8> {
        self.heading_styles
            .get(style_id)
            .copied()
            .or_else(|| heading_level_from_name(style_id))
    }

    fn is_ordered(&self, num_id: &str, ilvl: u32) -> bool {
        self.nums
            .get(num_id)
            .and_then(|abs| self.levels.get(&(abs.clone(), ilvl)))
            .copied()
            .unwrap_or(false)
    }
}

/// "heading 2" / "Heading2" → 2, "Title" → 1.
fn heading_level_from_name(name: &str) -> Option<u8> {
    let lower = name.to_ascii_lowercase();
    if lower == "title" {
        return Some(1);
    }
    let rest = lower.strip_prefix("heading")?.trim();
    match rest.parse::<u8>() {
        Ok(n @ 1..=6) => Some(n),
        Ok(n) if n > 6 => Some(6),
        _ => None,
    }
}

fn parse_heading_styles(xml: &str) -> Result<HashMap<String, u8>> {
    let mut out = HashMap::new();
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut current: Option<String> = None;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"style" => {
                current = attr(&e, b"styleId");
            }
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"name" => {
                if let (Some(id), Some(name)) = (current.as_ref(), attr(&e, b"val")) {
                    if let Some(level) = heading_level_from_name(&name) {
                        out.insert(id.clone(), level);
                    }
                }
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"style" => current = None,
            Ok(Event::Eof) => break,
            Err(e) => return Err(ooxml::xml_error("word/styles.xml", e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

type Numbering = (HashMap<String, String>, HashMap<(String, u32), bool>);

#[derive(Default)]
struct NumberingReader {
    nums: HashMap<String, String>,
    levels: HashMap<(String, u32), bool>,
    abstract_id: Option<String>,
    level: Option<u32>,
    num_id: Option<String>,
}

impl NumberingReader {
    fn open(&mut self, e: &BytesStart<'_>, empty: bool) {
        match e.local_name().as_ref() {
            b"abstractNum" if !empty => self.abstract_id = attr(e, b"abstractNumId"),
            b"lvl" if !empty => self.level = attr(e, b"ilvl").and_then(|v| v.parse().ok()),
            b"numFmt" => {
                if let (Some(a), Some(l)) = (self.abstract_id.as_ref(), self.level) {
                    let fmt = attr(e, b"val").unwrap_or_default();
                    let ordered = !matches!(fmt.as_str(), "bullet" | "none");
                    self.levels.insert((a.clone(), l), ordered);
                }
            }
            b"num" if !empty => self.num_id = attr(e, b"numId"),
            b"abstractNumId" => {
                if let (Some(n), Some(a)) = (self.num_id.as_ref(), attr(e, b"val")) {
                    self.nums.insert(n.clone(), a);
                }
            }
            _ => {}
        }
    }

    fn close(&mut self, name: &[u8]) {
        match name {
            b"abstractNum" => self.abstract_id = None,
            b"lvl" => self.level = None,
            b"num" => self.num_id = None,
            _ => {}
        }
    }
}

fn parse_numbering(xml: &str) -> Result<Numbering> {
    let mut state = NumberingReader::default();
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => state.open(&e, false),
            Ok(Event::Empty(e)) => state.open(&e, true),
            Ok(Event::End(e)) => state.close(e.local_name().as_ref()),
            Ok(Event::Eof) => break,
            Err(e) => return Err(ooxml::xml_error("word/numbering.xml", e)),
            _ => {}
        }
        buf.clear();
    }
    Ok((state.nums, state.levels))
}

#[derive(Default)]
struct Paragraph {
    style: Option<String>,
    num_id: Option<String>,
    ilvl: u32,
    html: String,
}

#[derive(Default)]
struct Run {
    bold: bool,
    italic: bool,
    underline: bool,
    html: String,
}

struct BodyWriter<'a> {
    ctx: &'a DocxContext,
    out: String,
    para: Option<Paragraph>,
    run: Option<Run>,
    in_ppr: bool,
    in_rpr: bool,
    in_text: bool,
    /// Alternate-content fallbacks duplicate the primary choice.
    fallback_depth: usize,
    /// Open lists, innermost last; `true` = ordered.
    lists: Vec<bool>,
    /// `<td>` not yet written; carries the column span.
    pending_cell: Option<u32>,
    links_open: usize,
    /// Paragraphs interrupted by a text box, resumed when the box closes.
    suspended: Vec<(Option<Paragraph>, Option<Run>)>,
}

impl<'a> BodyWriter<'a> {
    fn new(ctx: &'a DocxContext) -> Self {
        Self {
            ctx,
            out: String::new(),
            para: None,
            run: None,
            in_ppr: false,
            in_rpr: false,
            in_text: false,
            fallback_depth: 0,
            lists: Vec::new(),
            pending_cell: None,
            links_open: 0,
            suspended: Vec::new(),
        }
    }

    fn collecting_text(&self) -> bool {
        self.in_text && self.fallback_depth == 0
    }

    fn start(&mut self, e: &BytesStart<'_>) {
        let name = e.local_name();
        let name = name.as_ref();
        if name == b"Fallback" {
            self.fallback_depth += 1;
            return;
        }
        if self.fallback_depth > 0 {
            return;
        }
        match name {
            b"p" => {
                self.flush_cell();
                self.para = Some(Paragraph::default());
            }
            b"pPr" => self.in_ppr = true,
            b"pStyle" if self.in_ppr => {
                if let Some(p) = self.para.as_mut() {
                    p.style = attr(e, b"val");
                }
            }
            b"ilvl" if self.in_ppr => {
                if let Some(p) = self.para.as_mut() {
                    p.ilvl = attr(e, b"val").and_then(|v| v.parse().ok()).unwrap_or(0);
                }
            }
            b"numId" if self.in_ppr => {
                if let Some(p) = self.para.as_mut() {
                    p.num_id = attr(e, b"val").filter(|v| v != "0");
                }
            }
            b"r" if self.para.is_some() => self.run = Some(Run::default()),
            b"rPr" if self.run.is_some() => self.in_rpr = true,
            b"b" if self.in_rpr => self.set_run(|r| r.bold = toggle_on(e)),
            b"i" if self.in_rpr => self.set_run(|r| r.italic = toggle_on(e)),
            b"u" if self.in_rpr => self.set_run(|r| r.underline = toggle_on(e)),
            b"t" if self.run.is_some() && !self.in_rpr => self.in_text = true,
            b"tab" if self.run.is_some() && !self.in_ppr => self.push_run_html("\t"),
            b"br" | b"cr" if self.run.is_some() => self.push_run_html("<br>"),
            b"hyperlink" => {
                let href = attr(e, b"id")
                    .and_then(|rid| self.ctx.rels.get(&rid).cloned())
                    .or_else(|| attr(e, b"anchor").map(|a| format!("#{a}")));
                if let Some(p) = self.para.as_mut() {
                    match href {
                        Some(h) => p.html.push_str(&format!("<a href=\"{}\">", escape_html(&h))),
                        None => p.html.push_str("<a>"),
                    }
                    self.links_open += 1;
                }
            }
            b"txbxContent" => self.suspend_paragraph(),
            b"tbl" => {
                self.close_lists();
                self.flush_cell();
                self.out.push_str("<table><tbody>");
            }
            b"tr" => self.out.push_str("<tr>"),
            b"tc" => self.pending_cell = Some(1),
            b"gridSpan" => {
                if let Some(span) = self.pending_cell.as_mut() {
                    *span = attr(e, b"val")
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(1)
                        .max(1);
                }
            }
            _ => {}
        }
    }

    fn end(&mut self, name: &[u8]) {
        if name == b"Fallback" {
            self.fallback_depth = self.fallback_depth.saturating_sub(1);
            return;
        }
        if self.fallback_depth > 0 {
            return;
        }
        match name {
            b"t" => self.in_text = false,
            b"rPr" => self.in_rpr = false,
            b"pPr" => self.in_ppr = false,
            b"r" => {
                if let (Some(run), Some(p)) = (self.run.take(), self.para.as_mut()) {
                    p.html.push_str(&wrap_run(run));
                }
            }
            b"hyperlink" if self.links_open > 0 => {
                if let Some(p) = self.para.as_mut() {
                    p.html.push_str("</a>");
                }
                self.links_open -= 1;
            }
            b"p" => {
                if let Some(p) = self.para.take() {
                    self.write_paragraph(p);
                }
                self.links_open = 0;
            }
            b"txbxContent" => self.resume_paragraph(),
            b"tc" => {
                self.close_lists();
                self.flush_cell();
                self.out.push_str("</td>");
            }
            b"tr" => self.out.push_str("</tr>"),
            b"tbl" => {
                self.close_lists();
                self.out.push_str("</tbody></table>");
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        self.push_run_html(&escape_html(text));
    }

    fn set_run(&mut self, f: impl FnOnce(&mut Run)) {
        if let Some(r) = self.run.as_mut() {
            f(r);
        }
    }

    fn push_run_html(&mut self, html: &str) {
        if let Some(r) = self.run.as_mut() {
            r.html.push_str(html);
        }
    }

    /// Write what the enclosing paragraph has so far, so text box paragraphs land after it.
    fn suspend_paragraph(&mut self) {
        let run = self.run.take();
        let Some(mut para) = self.para.take() else {
            self.suspended.push((None, None));
            return;
        };
        let resumed_run = run.map(|r| {
            let format = Run {
                bold: r.bold,
                italic: r.italic,
                underline: r.underline,
                html: String::new(),
            };
            para.html.push_str(&wrap_run(r));
            format
        });
        let resumed = Paragraph {
            style: para.style.clone(),
            num_id: para.num_id.clone(),
            ilvl: para.ilvl,
            html: String::new(),
        };
        self.write_paragraph(para);
        self.links_open = 0;
        self.in_text = false;
        self.suspended.push((Some(resumed), resumed_run));
    }

    fn resume_paragraph(&mut self) {
        if let Some(p) = self.para.take() {
            self.write_paragraph(p);
        }
        self.links_open = 0;
        self.in_text = false;
        let (para, run) = self.suspended.pop().unwrap_or((None, None));
        self.para = para;
        self.run = run;
    }

    fn flush_cell(&mut self) {
        if let Some(span) = self.pending_cell.take() {
            if span > 1 {
                self.out.push_str(&format!("<td colspan=\"{span}\">"));
            } else {
                self.out.push_str("<td>");
            }
        }
    }

    fn close_lists(&mut self) {
        while let Some(ordered) = self.lists.pop() {
            self.out.push_str(if ordered { "</ol>" } else { "</ul>" });
        }
    }

    fn write_paragraph(&mut self, mut p: Paragraph) {
        for _ in 0..self.links_open {
            p.html.push_str("</a>");
        }
        if p.html.trim().is_empty() {
            return;
        }
        let heading = p.style.as_deref().and_then(|s| self.ctx.heading_level(s));
        match (heading, p.num_id.as_deref()) {
            (None, Some(num_id)) => {
                let depth = p.ilvl as usize + 1;
                while self.lists.len() > depth {
                    if let Some(ordered) = self.lists.pop() {
                        self.out.push_str(if ordered { "</ol>" } else { "</ul>" });
                    }
                }
                while self.lists.len() < depth {
                    let ordered = self.ctx.is_ordered(num_id, self.lists.len() as u32);
                    self.out.push_str(if ordered { "<ol>" } else { "<ul>" });
                    self.lists.push(ordered);
                }
                self.out.push_str("<li>");
                self.out.push_str(&p.html);
                self.out.push_str("</li>");
            }
            (Some(level), _) => {
                self.close_lists();
                self.out.push_str(&format!("<h{level}>{}</h{level}>", p.html));
            }
            (None, None) => {
                self.close_lists();
                self.out.push_str("<p>");
                self.out.push_str(&p.html);
                self.out.push_str("</p>");
            }
        }
    }

    fn finish(mut self) -> String {
        self.close_lists();
        self.out
    }
}

fn wrap_run(run: Run) -> String {
    let mut html = run.html;
    if html.is_empty() {
        return html;
    }
    if run.underline {
        html = format!("<u>{html}</u>");
    }
    if run.italic {
        html = format!("<em>{html}</em>");
    }
    if run.bold {
        html = format!("<strong>{html}</strong>");
    }
    html
}
