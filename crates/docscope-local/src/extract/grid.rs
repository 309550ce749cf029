//! Styled spreadsheet grid: the rich XLSX preview and its highlight surface.

use super::xlsx::{CellStyle, Workbook, Worksheet};
use crate::highlight::runs::InlineRuns;
use crate::highlight::{Fragment, TextSurface};
use crate::markup::escape_html;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridCell {
    /// 1-based position in the sheet.
    pub row: u32,
    pub col: u32,
    pub content: InlineRuns,
    pub style: CellStyle,
    /// `(rowspan, colspan)` when this cell anchors a merge.
    pub span: Option<(u32, u32)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridSheet {
    pub name: InlineRuns,
    pub col_widths: Vec<u32>,
    /// Rendered cells per row; cells covered by a merge are absent.
    pub rows: Vec<Vec<GridCell>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Anchor(u32, u32),
    Covered,
}

fn merge_slots(sheet: &Worksheet, rows: u32, cols: u32) -> HashMap<(u32, u32), Slot> {
    let mut slots = HashMap::new();
    for m in &sheet.merges {
        if m.first_row > rows || m.first_col > cols {
            continue;
        }
        let last_row = m.last_row.min(rows);
        let last_col = m.last_col.min(cols);
        if (last_row, last_col) == (m.first_row, m.first_col) {
            continue;
        }
        let anchor = (m.first_row, m.first_col);
        if slots.contains_key(&anchor) {
            continue;
        }
        slots.insert(
            anchor,
            Slot::Anchor(last_row - m.first_row + 1, last_col - m.first_col + 1),
        );
        for r in m.first_row..=last_row {
            for c in m.first_col..=last_col {
                if (r, c) != anchor {
                    slots.entry((r, c)).or_insert(Slot::Covered);
                }
            }
        }
    }
    slots
}

impl GridSheet {
    pub fn from_worksheet(sheet: &Worksheet) -> Self {
        let (rows, cols) = sheet.extent();
        let slots = merge_slots(sheet, rows, cols);
        let mut out_rows = Vec::with_capacity(rows as usize);
        for r in 1..=rows {
            let mut cells = Vec::with_capacity(cols as usize);
            for c in 1..=cols {
                let span = match slots.get(&(r, c)) {
                    Some(Slot::Covered) => continue,
                    Some(Slot::Anchor(rs, cs)) => Some((*rs, *cs)),
                    None => None,
                };
                let (text, style) = sheet
                    .cell(r, c)
                    .map(|cell| (cell.text.as_str(), cell.style.clone()))
                    .unwrap_or(("", CellStyle::default()));
                cells.push(GridCell {
                    row: r,
                    col: c,
                    content: InlineRuns::plain(text),
                    style,
                    span,
                });
            }
            out_rows.push(cells);
        }
        Self {
            name: InlineRuns::plain(&sheet.name),
            col_widths: (1..=cols).map(|c| sheet.column_width_px(c)).collect(),
            rows: out_rows,
        }
    }

    pub fn cell(&self, row: u32, col: u32) -> Option<&GridCell> {
        self.rows
            .iter()
            .flatten()
            .find(|cell| cell.row == row && cell.col == col)
    }

    fn write_html(&self, out: &mut String) {
        out.push_str("<section class=\"sheet\"><h3>");
        self.name.write_html(out, false);
        out.push_str("</h3><table class=\"excel-table\"><colgroup>");
        for w in &self.col_widths {
            out.push_str(&format!("<col style=\"width: {w}px\">"));
        }
        out.push_str("</colgroup><tbody>");
        for row in &self.rows {
            out.push_str("<tr>");
            for cell in row {
                write_cell(cell, out);
            }
            out.push_str("</tr>");
        }
        out.push_str("</tbody></table></section>");
    }
}

fn write_cell(cell: &GridCell, out: &mut String) {
    let s = &cell.style;
    let mut class = vec!["excel-cell"];
    if s.bold {
        class.push("bold");
    }
    if s.italic {
        class.push("italic");
    }
    if s.underline {
        class.push("underline");
    }
    if s.wrap {
        class.push("wrap");
    }
    let mut style = Vec::new();
    if let Some(bg) = &s.background {
        style.push(format!("--excel-bg: {bg}"));
    }
    if let Some(fg) = &s.foreground {
        style.push(format!("--excel-fg: {fg}"));
    }
    if let Some(h) = &s.align_h {
        style.push(format!("text-align: {h}"));
    }
    if let Some(v) = &s.align_v {
        style.push(format!("vertical-align: {v}"));
    }
    out.push_str(&format!("<td class=\"{}\"", class.join(" ")));
    if !style.is_empty() {
        out.push_str(&format!(" style=\"{}\"", escape_html(&style.join("; "))));
    }
    if let Some((rows, cols)) = cell.span {
        if rows > 1 {
            out.push_str(&format!(" rowspan=\"{rows}\""));
        }
        if cols > 1 {
            out.push_str(&format!(" colspan=\"{cols}\""));
        }
    }
    out.push('>');
    cell.content.write_html(out, true);
    out.push_str("</td>");
}

/// Every sheet of a workbook as a styled grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetGrid {
    pub sheets: Vec<GridSheet>,
}

impl SheetGrid {
    pub fn from_workbook(workbook: &Workbook) -> Self {
        Self {
            sheets: workbook.sheets.iter().map(GridSheet::from_worksheet).collect(),
        }
    }

    pub fn to_html(&self) -> String {
        let mut out = String::from("<div class=\"excel-viewer\">");
        for sheet in &self.sheets {
            sheet.write_html(&mut out);
        }
        out.push_str("</div>");
        out
    }

    pub fn marker_count(&self) -> usize {
        self.sheets
            .iter()
            .map(|s| {
                s.name.marker_count()
                    + s.rows
                        .iter()
                        .flatten()
                        .map(|c| c.content.marker_count())
                        .sum::<usize>()
            })
            .sum()
    }

    fn runs(&self, leaf: GridLeaf) -> Option<&InlineRuns> {
        let sheet = self.sheets.get(leaf.sheet)?;
        match leaf.cell {
            None => Some(&sheet.name),
            Some((r, c)) => sheet.rows.get(r)?.get(c).map(|cell| &cell.content),
        }
    }

    fn runs_mut(&mut self, leaf: GridLeaf) -> Option<&mut InlineRuns> {
        let sheet = self.sheets.get_mut(leaf.sheet)?;
        match leaf.cell {
            None => Some(&mut sheet.name),
            Some((r, c)) => sheet
                .rows
                .get_mut(r)?
                .get_mut(c)
                .map(|cell| &mut cell.content),
        }
    }
}

/// One text run: sheet index, `None` for the sheet title or `(row, cell)` indices into the
/// rendered rows, and the run index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLeaf {
    sheet: usize,
    cell: Option<(usize, usize)>,
    run: usize,
}

impl TextSurface for SheetGrid {
    type Leaf = GridLeaf;

    fn clear_markers(&mut self) -> usize {
        let mut cleared = 0;
        for sheet in &mut self.sheets {
            cleared += sheet.name.clear_markers();
            for cell in sheet.rows.iter_mut().flatten() {
                cleared += cell.content.clear_markers();
            }
        }
        cleared
    }

    fn text_leaves(&self) -> Vec<GridLeaf> {
        let mut out = Vec::new();
        for (si, sheet) in self.sheets.iter().enumerate() {
            out.extend(sheet.name.text_run_indices().map(|run| GridLeaf {
                sheet: si,
                cell: None,
                run,
            }));
            for (ri, row) in sheet.rows.iter().enumerate() {
                for (ci, cell) in row.iter().enumerate() {
                    out.extend(cell.content.text_run_indices().map(|run| GridLeaf {
                        sheet: si,
                        cell: Some((ri, ci)),
                        run,
                    }));
                }
            }
        }
        out
    }

    fn leaf_text(&self, leaf: GridLeaf) -> &str {
        self.runs(leaf).map(|r| r.run_text(leaf.run)).unwrap_or("")
    }

    fn replace_leaf(&mut self, leaf: GridLeaf, fragments: Vec<Fragment>) {
        if let Some(runs) = self.runs_mut(leaf) {
            runs.replace_run(leaf.run, fragments);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::xlsx::MergeRange;
    use crate::highlight::highlight;
    use docscope_core::KeywordSet;

    fn sheet_with_merge() -> Worksheet {
        let mut ws = Worksheet {
            name: "Sheet1".into(),
            ..Worksheet::default()
        };
        ws.merges.push(MergeRange::parse("A1:B2").unwrap());
        ws.merges.push(MergeRange::parse("C3:C3").unwrap());
        ws
    }

    #[test]
    fn two_by_two_merge_renders_one_spanning_cell() {
        let grid = GridSheet::from_worksheet(&sheet_with_merge());
        // Extent is 3x3 (the 1x1 merge at C3 widens it but carries no span).
        assert_eq!(grid.rows.len(), 3);
        assert_eq!(grid.rows[0].len(), 2);
        assert_eq!(grid.rows[0][0].span, Some((2, 2)));
        assert_eq!(grid.rows[0][1].col, 3);
        assert_eq!(grid.rows[1].len(), 1);
        assert_eq!(grid.rows[2].len(), 3);
        assert!(grid.cell(1, 2).is_none());
        assert!(grid.cell(2, 1).is_none());
        assert!(grid.cell(2, 2).is_none());
        assert_eq!(grid.cell(3, 3).and_then(|c| c.span), None);

        let html = SheetGrid {
            sheets: vec![grid],
        }
        .to_html();
        assert_eq!(html.matches("rowspan=\"2\" colspan=\"2\"").count(), 1);
        assert_eq!(html.matches("<td").count(), 6);
    }

    #[test]
    fn overlapping_merge_does_not_reanchor_a_covered_cell() {
        let mut ws = sheet_with_merge();
        ws.merges.push(MergeRange::parse("B2:C3").unwrap());
        let grid = GridSheet::from_worksheet(&ws);
        assert!(grid.cell(2, 2).is_none());
    }

    #[test]
    fn highlights_cells_and_sheet_titles_reversibly() {
        let grid = GridSheet {
            name: InlineRuns::plain("Budget"),
            col_widths: vec![100, 100],
            rows: vec![vec![
                GridCell {
                    row: 1,
                    col: 1,
                    content: InlineRuns::plain("budget line\nnext"),
                    style: CellStyle::default(),
                    span: None,
                },
                GridCell {
                    row: 1,
                    col: 2,
                    content: InlineRuns::plain("other"),
                    style: CellStyle::default(),
                    span: None,
                },
            ]],
        };
        let mut g = SheetGrid {
            sheets: vec![grid],
        };
        let original = g.clone();
        let stats = highlight(&mut g, &KeywordSet::from_terms(["budget"]));
        assert_eq!(stats.markers, 2);
        assert_eq!(g.marker_count(), 2);
        let html = g.to_html();
        assert!(html.contains("<h3><mark class=\"keyword-highlight\">Budget</mark></h3>"));
        assert!(html.contains("<mark class=\"keyword-highlight\">budget</mark> line<br>next"));

        highlight(&mut g, &KeywordSet::empty());
        assert_eq!(g, original);
    }

    #[test]
    fn cell_styles_become_classes_and_inline_style() {
        let cell = GridCell {
            row: 1,
            col: 1,
            content: InlineRuns::plain("x"),
            style: CellStyle {
                bold: true,
                align_h: Some("center".into()),
                background: Some("rgba(255, 0, 0, 1)".into()),
                ..CellStyle::default()
            },
            span: None,
        };
        let mut out = String::new();
        write_cell(&cell, &mut out);
        assert_eq!(
            out,
            "<td class=\"excel-cell bold\" style=\"--excel-bg: rgba(255, 0, 0, 1); text-align: center\">x</td>"
        );
    }
}
