//! Load a reference document into a [`ReferenceGrid`].
//!
//! Spreadsheets go through calamine (first sheet only, as exported); CSV
//! exports are read headerless with ragged rows allowed.

use super::{Cell, ReferenceError, ReferenceGrid};
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;

/// Load the grid from a spreadsheet or CSV file, chosen by extension.
pub fn load_grid(path: &Path) -> Result<ReferenceGrid, ReferenceError> {
    if !path.exists() {
        return Err(ReferenceError::NotFound(path.display().to_string()));
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => load_workbook(path),
        "csv" => load_csv(path),
        other => Err(ReferenceError::UnsupportedFormat(other.to_string())),
    }
}

fn load_workbook(path: &Path) -> Result<ReferenceGrid, ReferenceError> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| ReferenceError::Spreadsheet(format!("open {}: {e}", path.display())))?;

    let first = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ReferenceError::NoSheets(path.display().to_string()))?;

    let range = workbook
        .worksheet_range(&first)
        .map_err(|e| ReferenceError::Spreadsheet(format!("read sheet '{first}': {e}")))?;

    // Ranges start at the first used cell; pad so column 0 is the sheet's column A.
    let (row_offset, col_offset) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));

    let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); row_offset];
    for row in range.rows() {
        let mut cells = vec![Cell::Empty; col_offset];
        cells.extend(row.iter().map(cell_from_data));
        rows.push(cells);
    }

    tracing::debug!(path = %path.display(), sheet = %first, rows = rows.len(), "loaded workbook");
    Ok(ReferenceGrid::new(rows))
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::Float(v) => Cell::Number(*v),
        Data::Int(v) => Cell::Number(*v as f64),
        Data::String(s) => Cell::Text(s.clone()),
        Data::Bool(b) => Cell::Text(b.to_string()),
        // Date-formatted cells are not prices; keep them out of `Number`.
        Data::DateTime(dt) => Cell::Text(format!("date:{}", dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(e) => Cell::Text(format!("#{e:?}")),
    }
}

fn load_csv(path: &Path) -> Result<ReferenceGrid, ReferenceError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(Cell::parse).collect());
    }
    Ok(ReferenceGrid::new(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{ExcelDateTime, ExcelDateTimeType};
    use std::io::Write;

    #[test]
    fn csv_cells_are_classified() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "MAX of Close").unwrap();
        writeln!(file, "Row Labels,1,2").unwrap();
        writeln!(file, "2020,10.5,,x").unwrap();

        let grid = load_grid(file.path()).unwrap();
        assert_eq!(grid.height(), 3);
        assert_eq!(grid.cell(0, 0), &Cell::Text("MAX of Close".into()));
        assert_eq!(grid.cell(2, 0), &Cell::Number(2020.0));
        assert_eq!(grid.cell(2, 1), &Cell::Number(10.5));
        assert_eq!(grid.cell(2, 2), &Cell::Empty);
        assert_eq!(grid.cell(2, 3), &Cell::Text("x".into()));
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = load_grid(Path::new("/nonexistent/ref.xlsx")).unwrap_err();
        assert!(matches!(err, ReferenceError::NotFound(_)));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        let err = load_grid(file.path()).unwrap_err();
        assert!(matches!(err, ReferenceError::UnsupportedFormat(ref e) if e == "txt"));
    }

    #[test]
    fn calamine_values_map_to_cells() {
        assert_eq!(cell_from_data(&Data::Int(2020)), Cell::Number(2020.0));
        assert_eq!(cell_from_data(&Data::Float(1.5)), Cell::Number(1.5));
        assert_eq!(cell_from_data(&Data::Empty), Cell::Empty);
        assert_eq!(
            cell_from_data(&Data::String("Grand Total".into())),
            Cell::Text("Grand Total".into())
        );
    }

    #[test]
    fn date_cells_are_not_numbers() {
        let dt = ExcelDateTime::new(44_000.0, ExcelDateTimeType::DateTime, false);
        let cell = cell_from_data(&Data::DateTime(dt));
        assert_eq!(cell.as_number(), None);
        assert_eq!(cell, Cell::Text("date:44000".into()));
    }

    #[test]
    fn date_cell_in_a_month_column_is_skipped() {
        let dt = ExcelDateTime::new(44_000.0, ExcelDateTimeType::DateTime, false);
        let mut row = vec![Cell::Number(2020.0), cell_from_data(&Data::DateTime(dt))];
        row.extend((2..=12).map(|m| Cell::Number(m as f64)));
        let grid = ReferenceGrid::new(vec![row, vec![Cell::Text("Grand Total".into())]]);

        let extraction = crate::reference::extract_monthly_max_close(&grid);
        assert_eq!(extraction.values.len(), 11);
        assert_eq!(extraction.skipped_cells, 1);
        assert!(extraction.values.iter().all(|v| v.month != 1));
    }
}
