// src/utils/error.rs
use thiserror::Error;

// Define specific error types for different parts of the application
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractError {
    #[error("Regular expression error: {0}")]
    RegexError(String),

    /// A structural marker the layout requires is absent (closing balance,
    /// policy identifier, section title, statement date).
    #[error("Marker not found: {0}")]
    MarkerNotFound(String),

    #[error("Required field '{field}' missing on line {line}")]
    MissingField { field: &'static str, line: usize },

    #[error("Expected at least {expected} numeric values on line {line}, found {found}")]
    FieldCount {
        expected: usize,
        found: usize,
        line: usize,
    },

    #[error("Line index {index} out of range (statement has {len} lines)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Section '{0}' has a start marker but no fund rows")]
    EmptySection(String),

    #[error("Invalid date '{value}': {reason}")]
    InvalidDate { value: String, reason: String },

    #[error("Invalid number '{value}' on line {line}")]
    InvalidNumber { value: String, line: usize },

    #[error("Invalid column binding: {0}")]
    InvalidBinding(String),
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Reading statement failed: {0}")]
    Source(#[from] SourceError),

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Data processing failed: {0}")]
    Processing(String),
}

impl ExtractError {
    /// True for failures caused by the statement's layout rather than by the
    /// parser's own configuration.
    pub fn is_structural(&self) -> bool {
        !matches!(
            self,
            ExtractError::RegexError(_) | ExtractError::InvalidBinding(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_error_converts_into_app_error() {
        let err: AppError = ExtractError::MarkerNotFound("policy number".to_string()).into();
        assert!(matches!(err, AppError::Extraction(ExtractError::MarkerNotFound(_))));
        assert_eq!(err.to_string(), "Extraction failed: Marker not found: policy number");
    }

    #[test]
    fn test_structural_classification() {
        assert!(ExtractError::EmptySection("IUA".into()).is_structural());
        assert!(!ExtractError::RegexError("bad".into()).is_structural());
    }
}
