// src/utils/marker_debug.rs
use crate::extractors::markers::{LineSequence, MarkerKind, MarkerSet};
use crate::utils::error::AppError;
use std::fmt::Write as _;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Renders every line with its index and the marker kinds it matched.
///
/// ```text
///    12 | [section start] Initial Units Account
///    13 |                 Fund Units Unit Price ...
/// ```
pub fn render_listing(lines: &LineSequence, markers: &MarkerSet) -> String {
    let width = lines.len().to_string().len().max(4);
    let mut out = String::new();

    for (index, line) in lines.iter().enumerate() {
        let kinds = markers.kinds_matching(line);
        let tag = if kinds.is_empty() {
            String::new()
        } else {
            format!(
                "[{}] ",
                kinds
                    .iter()
                    .map(MarkerKind::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        };
        // Writing to a String cannot fail.
        let _ = writeln!(out, "{:>width$} | {}{}", index, tag, line, width = width);
    }
    out
}

/// Writes the annotated listing of a statement next to its output.
pub fn create_debug_listing(
    lines: &LineSequence,
    markers: &MarkerSet,
    path: &Path,
) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(render_listing(lines, markers).as_bytes())?;

    tracing::info!("Saved marker listing to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::markers::MarkerMatcher;

    #[test]
    fn test_listing_tags_marker_lines() {
        let lines = LineSequence::from_lines(["Stocks", "AAPL 10", "Equity and Index Options"]);
        let markers = MarkerSet::new()
            .with(MarkerKind::SectionStart, MarkerMatcher::exact(["Stocks"]))
            .with(MarkerKind::SectionEnd, MarkerMatcher::exact(["Equity and Index Options"]));

        let listing = render_listing(&lines, &markers);
        let rows: Vec<&str> = listing.lines().collect();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], "   0 | [section start] Stocks");
        assert_eq!(rows[1], "   1 | AAPL 10");
        assert_eq!(rows[2], "   2 | [section end] Equity and Index Options");
    }
}
