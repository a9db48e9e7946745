//! Reference spreadsheet data: the cell grid, extraction of the monthly
//! "max of close" section, loaders for xlsx/csv files and layout inspection.

pub mod extract;
pub mod inspect;
pub mod loader;

pub use extract::{extract_monthly_max_close, Extraction, ScanState, SectionExtractor};
pub use loader::load_grid;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One cell of a reference document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    /// Classify raw text as it appears in a CSV export.
    ///
    /// Blank text is `Empty`; anything that parses as a finite float is `Number`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Empty;
        }
        match trimmed.parse::<f64>() {
            Ok(v) if v.is_finite() => Cell::Number(v),
            _ => Cell::Text(raw.to_string()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Number(v) => write!(f, "{v}"),
            Cell::Text(s) => write!(f, "{s}"),
        }
    }
}

/// A two-dimensional grid of cells. Rows may have different lengths.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceGrid {
    rows: Vec<Vec<Cell>>,
}

impl ReferenceGrid {
    pub fn new(rows: Vec<Vec<Cell>>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Cell at (row, col), `Cell::Empty` when out of range.
    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        static EMPTY: Cell = Cell::Empty;
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY)
    }
}

/// A reference value for one calendar month. The instrument is implied by
/// the document it came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferencePeriodValue {
    pub year: i32,
    pub month: u32,
    pub reference_close_max: f64,
}

/// Errors opening or decoding a reference document.
///
/// A document that opens fine but has no recognizable section is *not* an
/// error; extraction simply returns nothing.
#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("reference file not found: {0}")]
    NotFound(String),

    #[error("unsupported reference format '{0}' (expected xlsx, xlsm, xls, xlsb, ods or csv)")]
    UnsupportedFormat(String),

    #[error("spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("workbook has no sheets: {0}")]
    NoSheets(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_classifies_cells() {
        assert_eq!(Cell::parse(""), Cell::Empty);
        assert_eq!(Cell::parse("   "), Cell::Empty);
        assert_eq!(Cell::parse("2020"), Cell::Number(2020.0));
        assert_eq!(Cell::parse(" 101.25 "), Cell::Number(101.25));
        assert_eq!(Cell::parse("Grand Total"), Cell::Text("Grand Total".into()));
        assert_eq!(Cell::parse("NaN"), Cell::Text("NaN".into()));
    }

    #[test]
    fn grid_cell_out_of_range_is_empty() {
        let grid = ReferenceGrid::new(vec![vec![Cell::Number(1.0)]]);
        assert_eq!(grid.cell(0, 0), &Cell::Number(1.0));
        assert_eq!(grid.cell(0, 5), &Cell::Empty);
        assert_eq!(grid.cell(9, 0), &Cell::Empty);
    }
}
