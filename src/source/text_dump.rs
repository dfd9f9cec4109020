// src/source/text_dump.rs
use super::PageTextProvider;
use crate::utils::error::SourceError;
use std::path::Path;

/// Page separator written by common PDF-to-text tools.
const PAGE_BREAK: char = '\u{0c}';

/// Reads a UTF-8 text export of a statement, one page per form-feed block.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextDumpProvider;

impl TextDumpProvider {
    pub fn new() -> Self {
        Self
    }

    pub fn split_pages(text: &str) -> Vec<String> {
        let mut pages: Vec<String> = text.split(PAGE_BREAK).map(|p| p.to_string()).collect();
        if pages.len() > 1 && pages.last().is_some_and(|p| p.trim().is_empty()) {
            pages.pop();
        }
        pages
    }
}

impl PageTextProvider for TextDumpProvider {
    fn page_texts(&self, path: &Path, password: Option<&str>) -> Result<Vec<String>, SourceError> {
        if password.is_some() {
            tracing::warn!("Password ignored for text export {}", path.display());
        }
        let text = std::fs::read_to_string(path)?;
        let pages = Self::split_pages(&text);
        tracing::debug!("Read {} pages from {}", pages.len(), path.display());
        Ok(pages)
    }
}
