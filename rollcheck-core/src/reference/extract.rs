//! Section extraction from a stacked pivot-table export.
//!
//! Spreadsheet exports stack several pivoted metrics vertically in one sheet:
//!
//! ```text
//! MAX of Close Last for the Month          <- title
//! (subtitle)
//! Row Labels | 1 | 2 | ... | 12 | Grand Total
//! 2019       | v | v | ... | v  |
//! 2020       | v | v | ... | v  |
//! Grand Total| ...                          <- terminator
//! YoY change ...                            <- a different metric, same layout
//! 2019       | ...
//! ```
//!
//! Only the first section is the monthly max close. The scan is a three-state
//! machine and never reads a row after the first terminator.

use super::{Cell, ReferenceGrid, ReferencePeriodValue};

/// Scanner position relative to the authoritative section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// No year row seen yet (title, subtitle, header rows).
    BeforeSection,
    /// Reading year rows of the first section.
    InSection,
    /// Terminator seen; nothing else is read.
    Done,
}

/// What a scan produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub values: Vec<ReferencePeriodValue>,
    /// Month cells inside the section that were blank or non-numeric.
    pub skipped_cells: usize,
    /// Year rows read inside the section.
    pub year_rows: usize,
    /// State the scanner stopped in. `BeforeSection` means no recognizable
    /// section was found.
    pub state: ScanState,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True when the scanner never found a year row.
    pub fn section_found(&self) -> bool {
        self.state != ScanState::BeforeSection
    }
}

/// Layout rules for locating the section.
#[derive(Debug, Clone)]
pub struct SectionExtractor {
    /// Inclusive bounds for a plausible year in column 0.
    pub year_range: (i32, i32),
    /// First-column text that ends the section (compared after trimming).
    pub terminator: String,
    /// Column holding January; the next eleven columns hold February..December.
    pub first_month_col: usize,
}

impl Default for SectionExtractor {
    fn default() -> Self {
        Self {
            year_range: (1980, 2030),
            terminator: "Grand Total".to_string(),
            first_month_col: 1,
        }
    }
}

impl SectionExtractor {
    /// Year in column 0 if this row is a year row.
    pub fn year_of(&self, row: &[Cell]) -> Option<i32> {
        let v = row.first()?.as_number()?;
        if v.fract() != 0.0 {
            return None;
        }
        let (lo, hi) = self.year_range;
        if v < f64::from(lo) || v > f64::from(hi) {
            return None;
        }
        Some(v as i32)
    }

    pub fn is_terminator(&self, row: &[Cell]) -> bool {
        row.first()
            .and_then(Cell::as_text)
            .map(|t| t.trim() == self.terminator)
            .unwrap_or(false)
    }

    /// Scan the grid and return the first section's monthly values.
    pub fn extract(&self, grid: &ReferenceGrid) -> Extraction {
        let mut state = ScanState::BeforeSection;
        let mut values = Vec::new();
        let mut skipped_cells = 0;
        let mut year_rows = 0;

        for row in grid.rows() {
            state = match state {
                ScanState::BeforeSection => match self.year_of(row) {
                    Some(year) => {
                        skipped_cells += self.read_months(year, row, &mut values);
                        year_rows += 1;
                        ScanState::InSection
                    }
                    None => ScanState::BeforeSection,
                },
                ScanState::InSection => {
                    if self.is_terminator(row) {
                        ScanState::Done
                    } else {
                        if let Some(year) = self.year_of(row) {
                            skipped_cells += self.read_months(year, row, &mut values);
                            year_rows += 1;
                        }
                        ScanState::InSection
                    }
                }
                ScanState::Done => ScanState::Done,
            };
            if state == ScanState::Done {
                break;
            }
        }

        if state == ScanState::BeforeSection {
            tracing::debug!("no year-row section found in reference grid");
        }

        Extraction {
            values,
            skipped_cells,
            year_rows,
            state,
        }
    }

    /// Push the twelve monthly values of a year row; returns the skip count.
    fn read_months(&self, year: i32, row: &[Cell], out: &mut Vec<ReferencePeriodValue>) -> usize {
        let mut skipped = 0;
        for month in 1..=12u32 {
            let col = self.first_month_col + (month as usize - 1);
            match row.get(col).and_then(Cell::as_number) {
                Some(v) => out.push(ReferencePeriodValue {
                    year,
                    month,
                    reference_close_max: v,
                }),
                None => skipped += 1,
            }
        }
        skipped
    }
}

/// Extract with the default layout rules.
pub fn extract_monthly_max_close(grid: &ReferenceGrid) -> Extraction {
    SectionExtractor::default().extract(grid)
}
