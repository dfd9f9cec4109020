// src/extractors/markers.rs

// --- Imports ---
use crate::utils::error::ExtractError;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::ops::Range;

// --- Line Sequence ---

/// All text lines of one statement, in reading order. Every index used by the
/// extractors points into this sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineSequence {
    lines: Vec<String>,
}

impl LineSequence {
    /// Splits already-joined statement text on line breaks.
    pub fn from_text(text: &str) -> Self {
        Self {
            lines: text.lines().map(|l| l.to_string()).collect(),
        }
    }

    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Line at `index`; an index past the end means the statement is malformed.
    pub fn get(&self, index: usize) -> Result<&str, ExtractError> {
        self.lines
            .get(index)
            .map(String::as_str)
            .ok_or(ExtractError::IndexOutOfRange {
                index,
                len: self.lines.len(),
            })
    }

    /// Checks that `range` lies inside the sequence.
    pub fn check_range(&self, range: &Range<usize>) -> Result<(), ExtractError> {
        if range.start > range.end || range.end > self.lines.len() {
            return Err(ExtractError::IndexOutOfRange {
                index: range.end.max(range.start),
                len: self.lines.len(),
            });
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }
}

// --- Markers ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MarkerKind {
    SectionStart,
    SectionEnd,
    RecordStart,
    OpenBalance,
    CloseBalance,
    FundHeader,
    TypeTag,
}

impl fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MarkerKind::SectionStart => "section start",
            MarkerKind::SectionEnd => "section end",
            MarkerKind::RecordStart => "record start",
            MarkerKind::OpenBalance => "opening balance",
            MarkerKind::CloseBalance => "closing balance",
            MarkerKind::FundHeader => "fund header",
            MarkerKind::TypeTag => "type tag",
        };
        f.write_str(name)
    }
}

/// A marker hit: which kind matched, the matched text and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub kind: MarkerKind,
    pub text: String,
    pub line: usize,
}

/// How a marker kind recognises its lines.
#[derive(Debug, Clone)]
pub enum MarkerMatcher {
    /// Whole line equal to one of a fixed vocabulary, ignoring leading and
    /// trailing whitespace.
    Exact(Vec<String>),
    /// Case-sensitive regex search anywhere in the line.
    Pattern(Regex),
}

impl MarkerMatcher {
    pub fn exact<I, S>(vocabulary: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        MarkerMatcher::Exact(vocabulary.into_iter().map(Into::into).collect())
    }

    pub fn pattern(pattern: &str) -> Result<Self, ExtractError> {
        Regex::new(pattern)
            .map(MarkerMatcher::Pattern)
            .map_err(|e| ExtractError::RegexError(format!("marker '{}': {}", pattern, e)))
    }

    /// The matched text, if `line` carries this marker.
    pub fn find<'a>(&self, line: &'a str) -> Option<&'a str> {
        match self {
            MarkerMatcher::Exact(vocabulary) => {
                let trimmed = line.trim();
                vocabulary
                    .iter()
                    .any(|v| v == trimmed)
                    .then_some(trimmed)
            }
            MarkerMatcher::Pattern(re) => re.find(line).map(|m| m.as_str()),
        }
    }

    pub fn is_match(&self, line: &str) -> bool {
        self.find(line).is_some()
    }
}

/// The markers a layout knows about, keyed by kind.
#[derive(Debug, Clone, Default)]
pub struct MarkerSet {
    matchers: HashMap<MarkerKind, MarkerMatcher>,
}

impl MarkerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: MarkerKind, matcher: MarkerMatcher) -> Self {
        self.matchers.insert(kind, matcher);
        self
    }

    pub fn matcher(&self, kind: MarkerKind) -> Result<&MarkerMatcher, ExtractError> {
        self.matchers
            .get(&kind)
            .ok_or_else(|| ExtractError::MarkerNotFound(format!("no '{}' marker configured", kind)))
    }

    /// Ascending indices in `range` whose line carries `kind`. Repeated hits
    /// are kept; callers count occurrences.
    pub fn locate(
        &self,
        lines: &LineSequence,
        kind: MarkerKind,
        range: Range<usize>,
    ) -> Result<Vec<usize>, ExtractError> {
        Ok(self
            .markers(lines, kind, range)?
            .into_iter()
            .map(|m| m.line)
            .collect())
    }

    /// Like [`MarkerSet::locate`] but keeps the matched text.
    pub fn markers(
        &self,
        lines: &LineSequence,
        kind: MarkerKind,
        range: Range<usize>,
    ) -> Result<Vec<Marker>, ExtractError> {
        lines.check_range(&range)?;
        let matcher = self.matcher(kind)?;

        let mut found = Vec::new();
        for index in range {
            let line = lines.get(index)?;
            if let Some(text) = matcher.find(line) {
                found.push(Marker {
                    kind,
                    text: text.to_string(),
                    line: index,
                });
            }
        }
        tracing::trace!("Located {} '{}' markers", found.len(), kind);
        Ok(found)
    }

    /// Every configured kind matching `line`, in kind order.
    pub fn kinds_matching(&self, line: &str) -> Vec<MarkerKind> {
        let mut kinds: Vec<MarkerKind> = self
            .matchers
            .iter()
            .filter(|(_, m)| m.is_match(line))
            .map(|(k, _)| *k)
            .collect();
        kinds.sort();
        kinds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LineSequence {
        LineSequence::from_text(
            "Initial Unit Account\n\
             Global Equity Fund SGD Acc 10.000 1.50 15.00 15.00\n\
             Initial Unit Account Charges 2.00\n\
             Asia Bond Fund EUR Acc 5.000 2.00 10.00 14.60\n\
             Initial Unit Account  \n\
             Asia Bond Fund EUR Acc 5.000 2.00 10.00 14.60",
        )
    }

    fn markers() -> MarkerSet {
        MarkerSet::new()
            .with(MarkerKind::SectionStart, MarkerMatcher::exact(["Initial Unit Account"]))
            .with(
                MarkerKind::FundHeader,
                MarkerMatcher::pattern(r"(SGDH? Acc|EUR Acc)").unwrap(),
            )
    }

    #[test]
    fn test_section_start_is_exact_match() {
        let hits = markers()
            .locate(&sample(), MarkerKind::SectionStart, 0..6)
            .unwrap();
        assert_eq!(hits, vec![0, 4]);
    }

    #[test]
    fn test_exact_match_ignores_padding_only() {
        let matcher = MarkerMatcher::exact(["Stocks"]);
        assert_eq!(matcher.find("  Stocks \t"), Some("Stocks"));
        assert!(!matcher.is_match("Stocks total"));
        assert!(!matcher.is_match("Sto cks"));
        assert!(!matcher.is_match("stocks"));
    }

    #[test]
    fn test_fund_header_keeps_duplicates_in_order() {
        let found = markers()
            .markers(&sample(), MarkerKind::FundHeader, 0..6)
            .unwrap();
        let lines: Vec<usize> = found.iter().map(|m| m.line).collect();
        assert_eq!(lines, vec![1, 3, 5]);
        assert_eq!(found[1].text, "EUR Acc");
    }

    #[test]
    fn test_fund_header_is_case_sensitive() {
        let lines = LineSequence::from_lines(["global fund sgd acc 1.00"]);
        let hits = markers().locate(&lines, MarkerKind::FundHeader, 0..1).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_range_past_end_is_error() {
        let err = markers()
            .locate(&sample(), MarkerKind::FundHeader, 2..9)
            .unwrap_err();
        assert_eq!(err, ExtractError::IndexOutOfRange { index: 9, len: 6 });
    }

    #[test]
    fn test_unconfigured_kind_is_reported() {
        let err = markers()
            .locate(&sample(), MarkerKind::OpenBalance, 0..6)
            .unwrap_err();
        assert!(matches!(err, ExtractError::MarkerNotFound(_)));
    }

    #[test]
    fn test_kinds_matching() {
        let kinds = markers().kinds_matching("Global Equity Fund SGD Acc 1.00");
        assert_eq!(kinds, vec![MarkerKind::FundHeader]);
    }
}
