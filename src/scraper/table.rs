//! Generic row/column walker for the dashboard's tables.

use chrono::NaiveDateTime;
use tracing::debug;

use super::cleaner::{parse_datetime, parse_float, parse_int, strip_quotes};
use super::error::Result;
use crate::driver::PageDriver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Float,
    /// strftime format of the cell text.
    Date(&'static str),
    /// Capture the `href` attribute instead of the text.
    Link,
}

/// Declared column: output field, selector relative to the row, coercion.
#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub field: &'static str,
    pub locator: &'static str,
    pub kind: ColumnKind,
}

impl Column {
    pub const fn new(field: &'static str, locator: &'static str, kind: ColumnKind) -> Self {
        Self {
            field,
            locator,
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Empty cell text. Distinct from zero and from "".
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Date(NaiveDateTime),
    Link(String),
}

/// `[start, end)` bound on the 1-based `nth-child` index of rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowWindow {
    pub start: usize,
    pub end: Option<usize>,
}

impl Default for RowWindow {
    fn default() -> Self {
        Self { start: 1, end: None }
    }
}

impl RowWindow {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: Vec<(&'static str, Cell)>,
}

impl Row {
    pub fn get(&self, field: &str) -> &Cell {
        self.cells
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, c)| c)
            .unwrap_or(&Cell::Null)
    }

    pub fn text(&self, field: &str) -> Option<String> {
        match self.get(field) {
            Cell::Text(s) | Cell::Link(s) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn integer(&self, field: &str) -> Option<i64> {
        match self.get(field) {
            Cell::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn float(&self, field: &str) -> Option<f64> {
        match self.get(field) {
            Cell::Float(v) => Some(*v),
            Cell::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn date(&self, field: &str) -> Option<NaiveDateTime> {
        match self.get(field) {
            Cell::Date(d) => Some(*d),
            _ => None,
        }
    }
}

/// Read rows `rows:nth-child(start ..)` and coerce each declared column.
///
/// The row count comes from `rows`; iteration stops at the last row or at
/// `window.end` (exclusive), whichever comes first.
pub fn extract_rows<D: PageDriver + ?Sized>(
    driver: &D,
    rows: &str,
    columns: &[Column],
    window: RowWindow,
) -> Result<Vec<Row>> {
    let total = driver.count(rows)?;
    debug!("{} rows under `{}`", total, rows);

    let mut out = Vec::new();
    for nth in window.start.max(1)..=total {
        if window.end == Some(nth) {
            break;
        }

        let row_selector = format!("{rows}:nth-child({nth})");
        let mut row = Row::default();
        for column in columns {
            let selector = format!("{row_selector} {}", column.locator);
            let cell = read_cell(driver, &selector, column)?;
            row.cells.push((column.field, cell));
        }
        out.push(row);
    }

    Ok(out)
}

fn read_cell<D: PageDriver + ?Sized>(driver: &D, selector: &str, column: &Column) -> Result<Cell> {
    if column.kind == ColumnKind::Link {
        return Ok(match driver.read_attribute(selector, "href")? {
            Some(href) if !href.is_empty() => Cell::Link(href),
            _ => Cell::Null,
        });
    }

    let text = strip_quotes(&driver.read_text(selector)?);
    if text.is_empty() {
        return Ok(Cell::Null);
    }

    Ok(match column.kind {
        ColumnKind::Text | ColumnKind::Link => Cell::Text(text),
        ColumnKind::Integer => Cell::Integer(parse_int(column.field, &text)?),
        ColumnKind::Float => Cell::Float(parse_float(column.field, &text)?),
        ColumnKind::Date(format) => Cell::Date(parse_datetime(column.field, &text, format)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::SnapshotDriver;

    const COLUMNS: [Column; 4] = [
        Column::new("name", "td:nth-child(1)", ColumnKind::Text),
        Column::new("price", "td:nth-child(2)", ColumnKind::Float),
        Column::new("shares", "td:nth-child(3)", ColumnKind::Integer),
        Column::new("doc", "td:nth-child(1) a", ColumnKind::Link),
    ];

    fn table(rows: usize) -> SnapshotDriver {
        let body: String = (1..=rows)
            .map(|i| {
                format!(
                    r#"<tr><td><a href="/doc/{i}">Row "{i}"</a></td><td>$1,234.50</td><td>{i},000</td></tr>"#
                )
            })
            .collect();
        let html = format!("<table><tbody>{body}</tbody></table>");
        SnapshotDriver::from_html("https://example.test/", &html)
    }

    #[test]
    fn test_coercion() {
        let d = table(2);
        let rows = extract_rows(&d, "table tbody tr", &COLUMNS, RowWindow::default()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].text("name").as_deref(), Some("Row 1"));
        assert_eq!(rows[0].float("price"), Some(1234.50));
        assert_eq!(rows[1].integer("shares"), Some(2000));
        assert_eq!(rows[1].get("doc"), &Cell::Link("/doc/2".to_string()));
    }

    #[test]
    fn test_window_caps_rows() {
        for total in [7, 12] {
            let d = table(total);
            let rows = extract_rows(&d, "table tbody tr", &COLUMNS, RowWindow::new(2, 7)).unwrap();
            assert_eq!(rows.len(), 5);
            assert_eq!(rows[0].text("name").as_deref(), Some("Row 2"));
            assert_eq!(rows[4].text("name").as_deref(), Some("Row 6"));
        }
    }

    #[test]
    fn test_short_table_has_no_padding() {
        let d = table(3);
        let rows = extract_rows(&d, "table tbody tr", &COLUMNS, RowWindow::new(2, 7)).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].text("name").as_deref(), Some("Row 3"));
        assert!(rows.iter().all(|r| r.get("doc") != &Cell::Null));

        assert!(extract_rows(&table(1), "table tbody tr", &COLUMNS, RowWindow::new(2, 7))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_empty_cells_are_null() {
        let html = r#"<table><tbody><tr><td></td><td> </td><td></td></tr></tbody></table>"#;
        let d = SnapshotDriver::from_html("https://example.test/", html);
        let rows = extract_rows(&d, "table tbody tr", &COLUMNS, RowWindow::default()).unwrap();
        for field in ["name", "price", "shares", "doc"] {
            assert_eq!(rows[0].get(field), &Cell::Null);
        }
    }

    #[test]
    fn test_bad_number_fails() {
        let html = r#"<table><tbody><tr><td>x</td><td>soon</td><td>1</td></tr></tbody></table>"#;
        let d = SnapshotDriver::from_html("https://example.test/", html);
        assert!(extract_rows(&d, "table tbody tr", &COLUMNS, RowWindow::default()).is_err());
    }
}
