// src/extractors/date.rs

// --- Imports ---
use crate::extractors::markers::LineSequence;
use crate::utils::error::ExtractError;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

// --- Regex Patterns (Lazy Static) ---
// "1 Oct 2024" style dates inside statement file names.
static FILENAME_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,2}) ([A-Za-z]{3}) (\d{4})").expect("Failed to compile FILENAME_DATE_RE")
});

/// Formats tried, in order, on a date captured from statement text.
const TEXT_DATE_FORMATS: &[&str] = &["%d %b %Y", "%d %B %Y", "%d/%m/%Y", "%Y-%m-%d", "%B %d, %Y"];

/// Reporting date encoded in a file name such as
/// `Statement_2510238_1 Oct 2024_to_31 Oct 2024.pdf`.
///
/// The name carries the period start and end; the second date (period end)
/// is the reporting date.
pub fn reporting_date_from_filename(file_name: &str) -> Result<NaiveDate, ExtractError> {
    let caps = FILENAME_DATE_RE
        .captures_iter(file_name)
        .nth(1)
        .ok_or_else(|| {
            ExtractError::MarkerNotFound(format!("period end date in file name '{}'", file_name))
        })?;

    // Zero-pad the day so "%d" parsing does not depend on width.
    let normalized = format!("{:0>2} {} {}", &caps[1], &caps[2], &caps[3]);
    NaiveDate::parse_from_str(&normalized, "%d %b %Y").map_err(|e| ExtractError::InvalidDate {
        value: caps[0].to_string(),
        reason: e.to_string(),
    })
}

/// Reporting date printed in the statement body.
///
/// `pattern` must capture the date text in its first group.
pub fn reporting_date_from_text(
    lines: &LineSequence,
    pattern: &Regex,
) -> Result<NaiveDate, ExtractError> {
    let captured = lines
        .iter()
        .find_map(|line| pattern.captures(line))
        .and_then(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
        .ok_or_else(|| ExtractError::MarkerNotFound("statement date in text".to_string()))?;

    parse_text_date(&captured)
}

pub fn parse_text_date(value: &str) -> Result<NaiveDate, ExtractError> {
    TEXT_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .ok_or_else(|| ExtractError::InvalidDate {
            value: value.to_string(),
            reason: format!("expected one of {:?}", TEXT_DATE_FORMATS),
        })
}

/// Picks the reporting date of a statement: an explicit override, else the
/// period end in the file name, else the date printed in the body when the
/// layout knows where to find it.
pub fn resolve_reporting_date(
    override_date: Option<NaiveDate>,
    file_name: &str,
    body: Option<(&LineSequence, &Regex)>,
) -> Result<NaiveDate, ExtractError> {
    if let Some(date) = override_date {
        return Ok(date);
    }
    match (reporting_date_from_filename(file_name), body) {
        (Ok(date), _) => Ok(date),
        (Err(e), Some((lines, pattern))) => {
            tracing::debug!("{}; trying statement text", e);
            reporting_date_from_text(lines, pattern)
        }
        (Err(e), None) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_date_is_reporting_date() {
        let date =
            reporting_date_from_filename("Endowus_Statement_2510238_1 Oct 2024_to_31 Oct 2024.pdf")
                .unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 10, 31).unwrap());
    }

    #[test]
    fn test_single_date_is_not_enough() {
        let err = reporting_date_from_filename("Statement_1 Oct 2024.pdf").unwrap_err();
        assert!(matches!(err, ExtractError::MarkerNotFound(_)));
    }

    #[test]
    fn test_unknown_month_is_invalid_date() {
        let err = reporting_date_from_filename("x_1 Oct 2024_to_31 Abc 2024.pdf").unwrap_err();
        assert!(matches!(err, ExtractError::InvalidDate { .. }));
    }

    #[test]
    fn test_date_from_text() {
        let lines = LineSequence::from_lines(["Policy Number: 123", "Statement Date: 31/10/2024"]);
        let re = Regex::new(r"Statement Date:\s*(.+)").unwrap();
        assert_eq!(
            reporting_date_from_text(&lines, &re).unwrap(),
            NaiveDate::from_ymd_opt(2024, 10, 31).unwrap()
        );
    }

    #[test]
    fn test_long_month_text_date() {
        assert_eq!(
            parse_text_date("October 31, 2024").unwrap(),
            NaiveDate::from_ymd_opt(2024, 10, 31).unwrap()
        );
    }

    #[test]
    fn test_resolution_order() {
        let lines = LineSequence::from_lines(["Statement Date: 30/09/2024"]);
        let re = Regex::new(r"Statement Date:\s*(.+)").unwrap();
        let named = "Statement_1 Oct 2024_to_31 Oct 2024.txt";
        let override_date = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();

        assert_eq!(
            resolve_reporting_date(Some(override_date), named, Some((&lines, &re))).unwrap(),
            override_date
        );
        assert_eq!(
            resolve_reporting_date(None, named, Some((&lines, &re))).unwrap(),
            NaiveDate::from_ymd_opt(2024, 10, 31).unwrap()
        );
        assert_eq!(
            resolve_reporting_date(None, "statement.txt", Some((&lines, &re))).unwrap(),
            NaiveDate::from_ymd_opt(2024, 9, 30).unwrap()
        );
        assert!(resolve_reporting_date(None, "statement.txt", None).is_err());
    }
}
