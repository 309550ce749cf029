//! XLSX workbook reader: values, cell styles, merges and column widths.
//!
//! The reader produces a [`Workbook`] model; the simple table markup (stored as the record's
//! `safe_markup`) and the styled grid surface (see [`crate::extract::grid`]) are both built
//! from it.

use crate::markup::escape_html;
use crate::ooxml::{self, attr, toggle_on};
use docscope_core::{ExtractedContent, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

pub const EMPTY_SHEET_MESSAGE: &str = "Empty sheet";

/// Column width used when a column has no explicit width, in px.
pub const DEFAULT_COLUMN_PX: u32 = 100;

/// Grids beyond these bounds are truncated (styled-but-empty cells can extend the used
/// range to the sheet limits).
pub const MAX_GRID_ROWS: u32 = 5_000;
pub const MAX_GRID_COLS: u32 = 256;

/// Excel theme colour index → `clrScheme` slot name.
const THEME_SLOTS: [&str; 12] = [
    "lt1", "dk1", "lt2", "dk2", "accent1", "accent2", "accent3", "accent4", "accent5", "accent6",
    "hlink", "folHlink",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CellStyle {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub align_h: Option<String>,
    pub align_v: Option<String>,
    pub wrap: bool,
    /// CSS colour, e.g. `rgba(255, 0, 0, 1)`.
    pub background: Option<String>,
    pub foreground: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cell {
    pub text: String,
    pub style: CellStyle,
}

/// Inclusive, 1-based cell range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MergeRange {
    pub first_row: u32,
    pub first_col: u32,
    pub last_row: u32,
    pub last_col: u32,
}

impl MergeRange {
    /// Parse `"A1:B2"`; a single reference is a 1x1 range.
    pub fn parse(reference: &str) -> Option<Self> {
        let (a, b) = reference.split_once(':').unwrap_or((reference, reference));
        let (r1, c1) = parse_cell_ref(a)?;
        let (r2, c2) = parse_cell_ref(b)?;
        Some(Self {
            first_row: r1.min(r2),
            first_col: c1.min(c2),
            last_row: r1.max(r2),
            last_col: c1.max(c2),
        })
    }

    pub fn row_span(&self) -> u32 {
        self.last_row - self.first_row + 1
    }

    pub fn col_span(&self) -> u32 {
        self.last_col - self.first_col + 1
    }
}

#[derive(Debug, Clone, Default)]
pub struct Worksheet {
    pub name: String,
    pub(crate) cells: BTreeMap<(u32, u32), Cell>,
    pub merges: Vec<MergeRange>,
    pub(crate) col_widths: BTreeMap<u32, f64>,
}

impl Worksheet {
    pub fn cell(&self, row: u32, col: u32) -> Option<&Cell> {
        self.cells.get(&(row, col))
    }

    /// Bounds `(first_row, first_col, last_row, last_col)` of cells holding text.
    pub fn value_bounds(&self) -> Option<(u32, u32, u32, u32)> {
        let mut it = self.cells.iter().filter(|(_, c)| !c.text.is_empty());
        let (&(r, c), _) = it.next()?;
        let mut b = (r, c, r, c);
        for (&(r, c), _) in it {
            b = (b.0.min(r), b.1.min(c), b.2.max(r), b.3.max(c));
        }
        Some((
            b.0,
            b.1,
            b.2.min(b.0.saturating_add(MAX_GRID_ROWS - 1)),
            b.3.min(b.1.saturating_add(MAX_GRID_COLS - 1)),
        ))
    }

    /// `(rows, cols)` of the used range from A1, styled cells and merges included.
    pub fn extent(&self) -> (u32, u32) {
        let mut rows = 0;
        let mut cols = 0;
        for &(r, c) in self.cells.keys() {
            rows = rows.max(r);
            cols = cols.max(c);
        }
        for m in &self.merges {
            rows = rows.max(m.last_row);
            cols = cols.max(m.last_col);
        }
        (rows.min(MAX_GRID_ROWS), cols.min(MAX_GRID_COLS))
    }

    /// `width * 7 + 5` px for explicit widths.
    pub fn column_width_px(&self, col: u32) -> u32 {
        self.col_widths
            .get(&col)
            .map(|w| (w * 7.0 + 5.0).round().max(0.0) as u32)
            .unwrap_or(DEFAULT_COLUMN_PX)
    }

    /// Value rows of the used range, row-major; missing cells are empty strings.
    pub fn value_rows(&self) -> Vec<Vec<&str>> {
        let Some((r0, c0, r1, c1)) = self.value_bounds() else {
            return Vec::new();
        };
        (r0..=r1)
            .map(|r| {
                (c0..=c1)
                    .map(|c| self.cell(r, c).map(|cell| cell.text.as_str()).unwrap_or(""))
                    .collect()
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Workbook {
    pub sheets: Vec<Worksheet>,
}

pub fn extract_xlsx(bytes: &[u8]) -> Result<ExtractedContent> {
    let workbook = read_workbook(bytes)?;
    let (safe_markup, plain_text) = workbook_markup(&workbook);
    tracing::debug!(sheets = workbook.sheets.len(), "xlsx extracted");
    Ok(ExtractedContent {
        safe_markup,
        plain_text,
        error: None,
    })
}

/// Heading plus header/body table per sheet, and the tab-separated text projection.
///
/// The text projection includes the header row so header terms are searchable.
pub fn workbook_markup(workbook: &Workbook) -> (String, String) {
    let mut html_parts = Vec::with_capacity(workbook.sheets.len());
    let mut text_parts = Vec::new();
    for sheet in &workbook.sheets {
        let title = format!("<h3>{}</h3>", escape_html(&sheet.name));
        let rows = sheet.value_rows();
        let Some((head, body)) = rows.split_first() else {
            html_parts.push(format!(
                "{title}<div class=\"empty-sheet\">{EMPTY_SHEET_MESSAGE}</div>"
            ));
            continue;
        };
        let mut html = title;
        html.push_str("<table class=\"excel-table\"><thead><tr>");
        for c in head {
            html.push_str(&format!("<th>{}</th>", cell_html(c)));
        }
        html.push_str("</tr></thead><tbody>");
        for row in body {
            html.push_str("<tr>");
            for c in row {
                html.push_str(&format!("<td>{}</td>", cell_html(c)));
            }
            html.push_str("</tr>");
        }
        html.push_str("</tbody></table>");
        html_parts.push(html);
        text_parts.push(
            rows.iter()
                .map(|r| r.join("\t"))
                .collect::<Vec<_>>()
                .join("\n"),
        );
    }
    (html_parts.join("\n"), text_parts.join("\n"))
}

fn cell_html(text: &str) -> String {
    escape_html(text).replace('\n', "<br>")
}

pub fn read_workbook(bytes: &[u8]) -> Result<Workbook> {
    let mut pkg = ooxml::open_package(bytes)?;
    let workbook_xml = ooxml::require_part(&mut pkg, "xl/workbook.xml")?;
    let sheet_refs = parse_sheet_list(&workbook_xml)?;
    let rels = match ooxml::read_part(&mut pkg, "xl/_rels/workbook.xml.rels")? {
        Some(xml) => ooxml::parse_relationships(&xml)?,
        None => HashMap::new(),
    };
    let shared = match ooxml::read_part(&mut pkg, "xl/sharedStrings.xml")? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };
    let theme = match ooxml::read_part(&mut pkg, "xl/theme/theme1.xml")? {
        Some(xml) => parse_theme_colors(&xml)?,
        None => Vec::new(),
    };
    let styles = match ooxml::read_part(&mut pkg, "xl/styles.xml")? {
        Some(xml) => parse_styles(&xml, &theme)?,
        None => Vec::new(),
    };

    let mut sheets = Vec::with_capacity(sheet_refs.len());
    for (i, (name, rel_id)) in sheet_refs.into_iter().enumerate() {
        let path = rel_id
            .and_then(|id| rels.get(&id))
            .map(|target| ooxml::resolve_target("xl", target))
            .unwrap_or_else(|| format!("xl/worksheets/sheet{}.xml", i + 1));
        let xml = ooxml::require_part(&mut pkg, &path)?;
        sheets.push(parse_sheet(name, &xml, &shared, &styles, &path)?);
    }
    Ok(Workbook { sheets })
}

/// `"AB12"` → `(12, 28)`.
pub fn parse_cell_ref(reference: &str) -> Option<(u32, u32)> {
    let reference = reference.trim().trim_start_matches('$');
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    let letters = letters.trim_end_matches('$');
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    let mut col: u32 = 0;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        col = col * 26 + (ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    let row: u32 = digits.parse().ok().filter(|r| *r > 0)?;
    Some((row, col))
}

/// Render a numeric cell value the way a spreadsheet shows an unformatted number.
fn format_number(raw: &str) -> String {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => format!("{v}"),
        _ => raw.to_string(),
    }
}

/// `FFRRGGBB` or `RRGGBB` → `rgba(r, g, b, a)`.
pub fn argb_to_css(hex: &str) -> Option<String> {
    let hex = hex.trim();
    let (a, rgb) = match hex.len() {
        8 => (u8::from_str_radix(&hex[0..2], 16).ok()?, &hex[2..]),
        6 => (255, hex),
        _ => return None,
    };
    let r = u8::from_str_radix(&rgb[0..2], 16).ok()?;
    let g = u8::from_str_radix(&rgb[2..4], 16).ok()?;
    let b = u8::from_str_radix(&rgb[4..6], 16).ok()?;
    let alpha = if a == 255 {
        "1".to_string()
    } else {
        let s = format!("{:.3}", f64::from(a) / 255.0);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    };
    Some(format!("rgba({r}, {g}, {b}, {alpha})"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ColorRef {
    Argb(String),
    Theme(usize),
}

impl ColorRef {
    fn from_element(e: &BytesStart<'_>) -> Option<Self> {
        if let Some(rgb) = attr(e, b"rgb") {
            return Some(Self::Argb(rgb));
        }
        attr(e, b"theme")
            .and_then(|t| t.parse().ok())
            .map(Self::Theme)
    }

    fn resolve(&self, theme: &[Option<String>]) -> Option<String> {
        match self {
            Self::Argb(hex) => argb_to_css(hex),
            Self::Theme(i) => theme.get(*i).cloned().flatten().and_then(|hex| argb_to_css(&hex)),
        }
    }
}

fn parse_sheet_list(xml: &str) -> Result<Vec<(String, Option<String>)>> {
    let mut out = Vec::new();
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) if e.local_name().as_ref() == b"sheet" => {
                let name = attr(&e, b"name").unwrap_or_else(|| format!("Sheet{}", out.len() + 1));
                out.push((name, attr(&e, b"id")));
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ooxml::xml_error("xl/workbook.xml", e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

fn parse_shared_strings(xml: &str) -> Result<Vec<String>> {
    let mut out = Vec::new();
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut current: Option<String> = None;
    let mut in_t = false;
    let mut phonetic = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_t = true,
                b"rPh" => phonetic = true,
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"si" => out.push(String::new()),
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"si" => out.push(current.take().unwrap_or_default()),
                b"t" => in_t = false,
                b"rPh" => phonetic = false,
                _ => {}
            },
            Ok(Event::Text(t)) if in_t && !phonetic => {
                if let Some(s) = current.as_mut() {
                    let text = t
                        .unescape()
                        .map_err(|e| ooxml::xml_error("xl/sharedStrings.xml", e))?;
                    s.push_str(&text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ooxml::xml_error("xl/sharedStrings.xml", e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

/// Theme colours indexed the way cell styles reference them.
fn parse_theme_colors(xml: &str) -> Result<Vec<Option<String>>> {
    let mut by_slot: HashMap<String, String> = HashMap::new();
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut in_scheme = false;
    let mut slot: Option<String> = None;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if name == "clrScheme" {
                    in_scheme = true;
                } else if in_scheme && THEME_SLOTS.contains(&name.as_str()) {
                    slot = Some(name);
                } else if in_scheme {
                    record_theme_color(&e, slot.as_deref(), &mut by_slot);
                }
            }
            Ok(Event::Empty(e)) if in_scheme => {
                record_theme_color(&e, slot.as_deref(), &mut by_slot);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"clrScheme" => in_scheme = false,
                n if slot.as_deref().map(str::as_bytes) == Some(n) => slot = None,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ooxml::xml_error("xl/theme/theme1.xml", e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(THEME_SLOTS
        .iter()
        .map(|s| by_slot.get(*s).cloned())
        .collect())
}

fn record_theme_color(e: &BytesStart<'_>, slot: Option<&str>, by_slot: &mut HashMap<String, String>) {
    let Some(slot) = slot else {
        return;
    };
    let value = match e.local_name().as_ref() {
        b"srgbClr" => attr(e, b"val"),
        b"sysClr" => attr(e, b"lastClr"),
        _ => None,
    };
    if let Some(v) = value {
        by_slot.entry(slot.to_string()).or_insert(v);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StyleSection {
    None,
    Fonts,
    Fills,
    CellXfs,
}

#[derive(Debug, Clone, Default)]
struct FontStyle {
    bold: bool,
    italic: bool,
    underline: bool,
    color: Option<ColorRef>,
}

#[derive(Debug, Clone, Default)]
struct XfStyle {
    font: usize,
    fill: usize,
    align_h: Option<String>,
    align_v: Option<String>,
    wrap: bool,
}

struct StylesReader {
    section: StyleSection,
    fonts: Vec<FontStyle>,
    fills: Vec<Option<ColorRef>>,
    xfs: Vec<XfStyle>,
    font: Option<FontStyle>,
    fill: Option<Option<ColorRef>>,
    in_pattern: bool,
    xf: Option<XfStyle>,
}

impl StylesReader {
    fn open(&mut self, e: &BytesStart<'_>) {
        match (self.section, e.local_name().as_ref()) {
            (_, b"fonts") => self.section = StyleSection::Fonts,
            (_, b"fills") => self.section = StyleSection::Fills,
            (_, b"cellXfs") => self.section = StyleSection::CellXfs,
            (StyleSection::Fonts, b"font") => self.font = Some(FontStyle::default()),
            (StyleSection::Fonts, b"b") => self.set_font(|f| f.bold = toggle_on(e)),
            (StyleSection::Fonts, b"i") => self.set_font(|f| f.italic = toggle_on(e)),
            (StyleSection::Fonts, b"u") => self.set_font(|f| f.underline = toggle_on(e)),
            (StyleSection::Fonts, b"color") => {
                let c = ColorRef::from_element(e);
                self.set_font(|f| f.color = c);
            }
            (StyleSection::Fills, b"fill") => self.fill = Some(None),
            (StyleSection::Fills, b"patternFill") => self.in_pattern = true,
            (StyleSection::Fills, b"fgColor") if self.in_pattern => {
                if let Some(fill) = self.fill.as_mut() {
                    *fill = ColorRef::from_element(e);
                }
            }
            (StyleSection::CellXfs, b"xf") => {
                self.xf = Some(XfStyle {
                    font: attr(e, b"fontId").and_then(|v| v.parse().ok()).unwrap_or(0),
                    fill: attr(e, b"fillId").and_then(|v| v.parse().ok()).unwrap_or(0),
                    ..XfStyle::default()
                });
            }
            (StyleSection::CellXfs, b"alignment") => {
                if let Some(xf) = self.xf.as_mut() {
                    xf.align_h = attr(e, b"horizontal").filter(|h| h != "general");
                    xf.align_v = attr(e, b"vertical");
                    xf.wrap = matches!(attr(e, b"wrapText").as_deref(), Some("1" | "true"));
                }
            }
            _ => {}
        }
    }

    fn close(&mut self, name: &[u8]) {
        match (self.section, name) {
            (_, b"fonts" | b"fills" | b"cellXfs") => self.section = StyleSection::None,
            (StyleSection::Fonts, b"font") => {
                if let Some(f) = self.font.take() {
                    self.fonts.push(f);
                }
            }
            (StyleSection::Fills, b"patternFill") => self.in_pattern = false,
            (StyleSection::Fills, b"fill") => {
                if let Some(f) = self.fill.take() {
                    self.fills.push(f);
                }
            }
            (StyleSection::CellXfs, b"xf") => {
                if let Some(xf) = self.xf.take() {
                    self.xfs.push(xf);
                }
            }
            _ => {}
        }
    }

    fn set_font(&mut self, f: impl FnOnce(&mut FontStyle)) {
        if let Some(font) = self.font.as_mut() {
            f(font);
        }
    }
}

/// Resolved `CellStyle` per `cellXfs` index.
fn parse_styles(xml: &str, theme: &[Option<String>]) -> Result<Vec<CellStyle>> {
    let mut r = StylesReader {
        section: StyleSection::None,
        fonts: Vec::new(),
        fills: Vec::new(),
        xfs: Vec::new(),
        font: None,
        fill: None,
        in_pattern: false,
        xf: None,
    };
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => r.open(&e),
            Ok(Event::Empty(e)) => {
                r.open(&e);
                r.close(e.local_name().as_ref());
            }
            Ok(Event::End(e)) => r.close(e.local_name().as_ref()),
            Ok(Event::Eof) => break,
            Err(e) => return Err(ooxml::xml_error("xl/styles.xml", e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(r.xfs
        .iter()
        .map(|xf| {
            let font = r.fonts.get(xf.font).cloned().unwrap_or_default();
            CellStyle {
                bold: font.bold,
                italic: font.italic,
                underline: font.underline,
                align_h: xf.align_h.clone(),
                align_v: xf.align_v.clone(),
                wrap: xf.wrap,
                background: r
                    .fills
                    .get(xf.fill)
                    .and_then(|f| f.as_ref())
                    .and_then(|c| c.resolve(theme)),
                foreground: font.color.as_ref().and_then(|c| c.resolve(theme)),
            }
        })
        .collect())
}

struct PendingCell {
    row: u32,
    col: u32,
    kind: String,
    style: usize,
    value: String,
    inline: String,
}

struct SheetReader<'a> {
    shared: &'a [String],
    styles: &'a [CellStyle],
    sheet: Worksheet,
    row: u32,
    col: u32,
    cell: Option<PendingCell>,
    in_value: bool,
    in_inline: bool,
    in_inline_text: bool,
}

impl SheetReader<'_> {
    fn open(&mut self, e: &BytesStart<'_>) {
        match e.local_name().as_ref() {
            b"row" => {
                self.row = attr(e, b"r")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(self.row.saturating_add(1));
                self.col = 0;
            }
            b"c" => {
                let (row, col) = attr(e, b"r")
                    .and_then(|r| parse_cell_ref(&r))
                    .unwrap_or((self.row.max(1), self.col.saturating_add(1)));
                self.row = row;
                self.col = col;
                self.cell = Some(PendingCell {
                    row,
                    col,
                    kind: attr(e, b"t").unwrap_or_else(|| "n".to_string()),
                    style: attr(e, b"s").and_then(|v| v.parse().ok()).unwrap_or(0),
                    value: String::new(),
                    inline: String::new(),
                });
            }
            b"v" if self.cell.is_some() => self.in_value = true,
            b"is" if self.cell.is_some() => self.in_inline = true,
            b"t" if self.in_inline => self.in_inline_text = true,
            b"mergeCell" => {
                if let Some(m) = attr(e, b"ref").and_then(|r| MergeRange::parse(&r)) {
                    self.sheet.merges.push(m);
                }
            }
            b"col" => {
                let min: u32 = attr(e, b"min").and_then(|v| v.parse().ok()).unwrap_or(0);
                let max: u32 = attr(e, b"max").and_then(|v| v.parse().ok()).unwrap_or(min);
                let width: Option<f64> = attr(e, b"width").and_then(|v| v.parse().ok());
                if let Some(w) = width {
                    for c in min.max(1)..=max.min(MAX_GRID_COLS) {
                        self.sheet.col_widths.insert(c, w);
                    }
                }
            }
            _ => {}
        }
    }

    fn close(&mut self, name: &[u8]) {
        match name {
            b"v" => self.in_value = false,
            b"t" => self.in_inline_text = false,
            b"is" => self.in_inline = false,
            b"c" => {
                if let Some(cell) = self.cell.take() {
                    self.finish_cell(cell);
                }
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        let Some(cell) = self.cell.as_mut() else {
            return;
        };
        if self.in_value {
            cell.value.push_str(text);
        } else if self.in_inline_text {
            cell.inline.push_str(text);
        }
    }

    fn finish_cell(&mut self, cell: PendingCell) {
        let text = match cell.kind.as_str() {
            "s" => cell
                .value
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|i| self.shared.get(i).cloned())
                .unwrap_or_default(),
            "inlineStr" => cell.inline,
            "b" => match cell.value.trim() {
                "1" => "TRUE".to_string(),
                "0" => "FALSE".to_string(),
                other => other.to_string(),
            },
            "n" if !cell.value.is_empty() => format_number(&cell.value),
            _ => cell.value,
        };
        let style = self.styles.get(cell.style).cloned().unwrap_or_default();
        if text.is_empty() && style == CellStyle::default() {
            return;
        }
        self.sheet
            .cells
            .insert((cell.row, cell.col), Cell { text, style });
    }
}

fn parse_sheet(
    name: String,
    xml: &str,
    shared: &[String],
    styles: &[CellStyle],
    part: &str,
) -> Result<Worksheet> {
    let mut r = SheetReader {
        shared,
        styles,
        sheet: Worksheet {
            name,
            ..Worksheet::default()
        },
        row: 0,
        col: 0,
        cell: None,
        in_value: false,
        in_inline: false,
        in_inline_text: false,
    };
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => r.open(&e),
            Ok(Event::Empty(e)) => {
                r.open(&e);
                r.close(e.local_name().as_ref());
            }
            Ok(Event::End(e)) => r.close(e.local_name().as_ref()),
            Ok(Event::Text(t)) => {
                let text = t.unescape().map_err(|e| ooxml::xml_error(part, e))?;
                r.text(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ooxml::xml_error(part, e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(r.sheet)
}
