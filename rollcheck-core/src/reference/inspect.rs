//! Layout inspection for unfamiliar reference documents.

use super::{Cell, ReferenceGrid};

/// A row that mentions one of the searched markers.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerRow {
    pub index: usize,
    pub text: String,
}

/// Rows whose non-empty cells, joined by spaces, contain any needle
/// (case-insensitive).
pub fn find_marker_rows(grid: &ReferenceGrid, needles: &[&str]) -> Vec<MarkerRow> {
    let lowered: Vec<String> = needles.iter().map(|n| n.to_lowercase()).collect();
    grid.rows()
        .iter()
        .enumerate()
        .filter_map(|(index, row)| {
            let text = join_row(row);
            let hay = text.to_lowercase();
            lowered
                .iter()
                .any(|n| hay.contains(n.as_str()))
                .then_some(MarkerRow { index, text })
        })
        .collect()
}

/// First `n` rows rendered as tab-separated text.
pub fn preview(grid: &ReferenceGrid, n: usize) -> Vec<String> {
    grid.rows()
        .iter()
        .take(n)
        .map(|row| row.iter().map(Cell::to_string).collect::<Vec<_>>().join("\t"))
        .collect()
}

fn join_row(row: &[Cell]) -> String {
    row.iter()
        .filter(|c| **c != Cell::Empty)
        .map(Cell::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}
