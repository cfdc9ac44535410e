//! Tabular extraction: CSV and XLSX are flattened into `header: value` lines
//! so row context survives chunking.

use crate::error::ApiError;
use calamine::{Data, Reader, Xlsx};
use std::io::Cursor;

/// Parse CSV content into one text line per row, pairing each cell with its
/// header.
pub fn parse_csv_to_text(bytes: &[u8]) -> Result<String, ApiError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(Cursor::new(bytes));

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ApiError::Validation(format!("invalid CSV: {}", e)))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut result = String::new();
    for record in reader.records() {
        let record = record.map_err(|e| ApiError::Validation(format!("invalid CSV row: {}", e)))?;
        let mut row_text = String::new();
        for (i, value) in record.iter().enumerate() {
            if i < headers.len() && !value.trim().is_empty() {
                if !row_text.is_empty() {
                    row_text.push_str(", ");
                }
                row_text.push_str(&format!("{}: {}", headers[i], value.trim()));
            }
        }
        if !row_text.is_empty() {
            result.push_str(&row_text);
            result.push('\n');
        }
    }

    Ok(result)
}

/// Flatten every sheet of an XLSX workbook into text, one row per line with
/// cells joined by `, `. Empty cells are skipped.
pub fn parse_xlsx_to_text(bytes: &[u8], filename: &str) -> Result<String, ApiError> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))
        .map_err(|e| ApiError::Validation(format!("'{}' is not a valid XLSX file: {}", filename, e)))?;

    let mut result = String::new();
    let sheet_names = workbook.sheet_names().to_owned();
    for sheet in sheet_names {
        let range = workbook
            .worksheet_range(&sheet)
            .map_err(|e| ApiError::Validation(format!("failed to read sheet '{}': {}", sheet, e)))?;

        result.push_str(&format!("Sheet: {}\n", sheet));
        for row in range.rows() {
            let cells: Vec<String> = row
                .iter()
                .filter(|c| !matches!(c, Data::Empty))
                .map(|c| c.to_string().trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !cells.is_empty() {
                result.push_str(&cells.join(", "));
                result.push('\n');
            }
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_header_value_pairs() {
        let csv = b"name,course,year\nAlice,Physics,2\nBob,Maths,1\n";
        let text = parse_csv_to_text(csv).unwrap();
        assert_eq!(
            text,
            "name: Alice, course: Physics, year: 2\nname: Bob, course: Maths, year: 1\n"
        );
    }

    #[test]
    fn test_csv_empty_cells_skipped() {
        let csv = b"name,course\nAlice,\n";
        let text = parse_csv_to_text(csv).unwrap();
        assert_eq!(text, "name: Alice\n");
    }

    #[test]
    fn test_csv_header_only() {
        let csv = b"name,course\n";
        assert_eq!(parse_csv_to_text(csv).unwrap(), "");
    }

    #[test]
    fn test_invalid_xlsx_rejected() {
        let err = parse_xlsx_to_text(b"nope", "bad.xlsx").unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
