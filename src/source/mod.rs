// src/source/mod.rs
//! Interfaces to the document readers that feed the extractors, and the step
//! that turns page texts into one line sequence.

pub mod text_dump;
pub mod xlsx;

use crate::extractors::markers::LineSequence;
use crate::utils::error::{ExtractError, SourceError};
use std::collections::HashMap;
use std::path::Path;

pub use text_dump::TextDumpProvider;
pub use xlsx::XlsxReader;

/// Supplies the text of each page of a document, in reading order.
pub trait PageTextProvider {
    fn page_texts(&self, path: &Path, password: Option<&str>) -> Result<Vec<String>, SourceError>;
}

/// Supplies spreadsheet rows keyed by column name.
pub trait TabularReader {
    fn read_rows(&self) -> Result<Vec<TabularRow>, SourceError>;
}

/// One spreadsheet row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabularRow {
    cells: HashMap<String, String>,
}

impl TabularRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.cells.insert(column.into(), value.into());
    }

    /// Cell text; a column missing from the sheet is a structural error.
    pub fn get(&self, column: &str) -> Result<&str, ExtractError> {
        self.cells
            .get(column)
            .map(String::as_str)
            .ok_or_else(|| ExtractError::MarkerNotFound(format!("column '{}'", column)))
    }
}

/// True if `page` contains every phrase, ignoring case.
pub fn page_matches(page: &str, phrases: &[String]) -> bool {
    let lowered = page.to_lowercase();
    phrases
        .iter()
        .all(|phrase| lowered.contains(&phrase.to_lowercase()))
}

/// Joins the pages that pass the phrase filter with line breaks.
pub fn join_pages(pages: &[String], phrases: &[String]) -> String {
    let kept: Vec<&str> = pages
        .iter()
        .filter(|page| page_matches(page, phrases))
        .map(String::as_str)
        .collect();
    tracing::debug!("Using {} of {} pages", kept.len(), pages.len());
    kept.join("\n")
}

/// Joins the pages that pass the phrase filter and splits them into lines.
pub fn build_line_sequence(pages: &[String], phrases: &[String]) -> LineSequence {
    LineSequence::from_text(&join_pages(pages, phrases))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pages_filtered_by_all_phrases() {
        let pages = vec![
            "Goal Summary\nRetirement".to_string(),
            "Disclaimer".to_string(),
            "goal summary continued\nEducation".to_string(),
        ];
        let lines = build_line_sequence(&pages, &["Goal Summary".to_string()]);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines.get(3).unwrap(), "Education");
    }

    #[test]
    fn test_no_phrases_keeps_every_page() {
        let pages = vec!["a\nb".to_string(), "c".to_string()];
        assert_eq!(build_line_sequence(&pages, &[]).len(), 3);
    }

    #[test]
    fn test_missing_column() {
        let row = TabularRow::new().with("Event", "Buy");
        assert_eq!(row.get("Event").unwrap(), "Buy");
        assert!(matches!(row.get("Price"), Err(ExtractError::MarkerNotFound(_))));
    }
}
