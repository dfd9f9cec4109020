// src/source/xlsx.rs
use super::{TabularReader, TabularRow};
use crate::utils::error::SourceError;
use calamine::{open_workbook, Data, Reader, Xlsx};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::path::PathBuf;

/// Reads the first worksheet of an xlsx export; the first non-empty row is
/// the header.
#[derive(Debug, Clone)]
pub struct XlsxReader {
    path: PathBuf,
}

impl XlsxReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TabularReader for XlsxReader {
    fn read_rows(&self) -> Result<Vec<TabularRow>, SourceError> {
        let mut workbook: Xlsx<_> = open_workbook(&self.path).map_err(|e| {
            SourceError::Spreadsheet(format!("Cannot open {}: {}", self.path.display(), e))
        })?;

        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| SourceError::Spreadsheet(format!("{} has no sheets", self.path.display())))?;
        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| SourceError::Spreadsheet(format!("Cannot read sheet '{}': {}", sheet_name, e)))?;

        let mut rows = range.rows();
        let header: Vec<String> = rows
            .by_ref()
            .find(|row| row.iter().any(|cell| cell_text(cell).is_some()))
            .map(|row| {
                row.iter()
                    .map(|cell| cell_text(cell).unwrap_or_default().trim().to_string())
                    .collect()
            })
            .ok_or_else(|| SourceError::Spreadsheet(format!("Sheet '{}' is empty", sheet_name)))?;

        let mut out = Vec::new();
        for row in rows {
            if row.iter().all(|cell| cell_text(cell).is_none()) {
                continue;
            }
            let mut record = TabularRow::new();
            for (column, cell) in header.iter().zip(row.iter()) {
                if column.is_empty() {
                    continue;
                }
                record.insert(column.clone(), cell_text(cell).unwrap_or_default());
            }
            out.push(record);
        }

        tracing::debug!("Read {} rows from sheet '{}'", out.len(), sheet_name);
        Ok(out)
    }
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Data::Float(f) => Some(f.to_string()),
        Data::Int(i) => Some(i.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(dt) => excel_serial_to_datetime(dt.as_f64())
            .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string()),
        Data::DateTimeIso(s) => Some(s.clone()),
        _ => None,
    }
}

/// Converts an Excel serial day number (1900 date system) to a timestamp.
/// Serials outside chrono's range give `None`.
fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let seconds = (serial * 86_400.0).round() as i64;
    base.checked_add_signed(Duration::try_seconds(seconds)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excel_serial_conversion() {
        // 45566.5 is 2024-10-01 12:00:00
        let dt = excel_serial_to_datetime(45566.5).unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M:%S").to_string(), "2024-10-01 12:00:00");
    }

    #[test]
    fn test_out_of_range_serial_is_none() {
        assert_eq!(excel_serial_to_datetime(1e300), None);
        assert_eq!(excel_serial_to_datetime(-1e300), None);
        assert_eq!(excel_serial_to_datetime(1e12), None);
        assert_eq!(excel_serial_to_datetime(f64::NAN), None);
    }

    #[test]
    fn test_blank_string_cell_is_empty() {
        assert_eq!(cell_text(&Data::String("  ".to_string())), None);
        assert_eq!(cell_text(&Data::Int(7)), Some("7".to_string()));
    }

    #[test]
    fn test_missing_workbook_is_spreadsheet_error() {
        let err = XlsxReader::new("/nonexistent/trades.xlsx").read_rows().unwrap_err();
        assert!(matches!(err, SourceError::Spreadsheet(_)));
    }
}
