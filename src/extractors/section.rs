// src/extractors/section.rs

// --- Imports ---
use crate::extractors::markers::{LineSequence, MarkerKind, MarkerSet};
use crate::extractors::tokens::TokenPattern;
use crate::models::{report_month, SummaryRecord};
use crate::utils::error::ExtractError;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::ops::Range;

// --- Constants ---
/// Positional values on a summary fund line: units, unit price, value in the
/// fund's currency, value in the reporting currency.
const SUMMARY_FIELDS: usize = 4;

// --- Regex Patterns (Lazy Static) ---
// Leading non-numeric portion of a fund line.
static FUND_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z\s\-]+").expect("Failed to compile FUND_NAME_RE")
});

/// Walks one summary section occurrence and emits a row per fund line.
pub struct SectionExtractor<'a> {
    markers: &'a MarkerSet,
    tokens: &'a TokenPattern,
}

impl<'a> SectionExtractor<'a> {
    pub fn new(markers: &'a MarkerSet, tokens: &'a TokenPattern) -> Self {
        Self { markers, tokens }
    }

    /// Extracts the fund rows of the section whose start marker sits at
    /// `range.start`.
    ///
    /// Fund lines are expected to be contiguous: the first line after the
    /// block that is not a fund header ends the section. A range without any
    /// fund header yields no rows.
    pub fn extract_summary(
        &self,
        lines: &LineSequence,
        range: Range<usize>,
        as_of_date: NaiveDate,
    ) -> Result<Vec<SummaryRecord>, ExtractError> {
        lines.check_range(&range)?;
        let fund_header = self.markers.matcher(MarkerKind::FundHeader)?;

        let mut found_any = false;
        let mut records = Vec::new();

        for index in (range.start + 1)..range.end {
            let line = lines.get(index)?;

            if !fund_header.is_match(line) {
                if found_any {
                    tracing::debug!("Summary section starting at line {} ended at line {}", range.start, index);
                    break;
                }
                continue;
            }
            found_any = true;

            let fund_name = fund_name(line, index)?;
            let values = self.tokens.parse_line(line);
            if values.len() < SUMMARY_FIELDS {
                return Err(ExtractError::FieldCount {
                    expected: SUMMARY_FIELDS,
                    found: values.len(),
                    line: index,
                });
            }
            tracing::trace!("Summary fund '{}' at line {}: {:?}", fund_name, index, values);

            records.push(SummaryRecord {
                report_month: report_month(as_of_date),
                as_of_date,
                account_type: None,
                policy_number: None,
                fund_name,
                units: values[0],
                unit_price_fund_currency: values[1],
                value_fund_currency: values[2],
                value_reporting_currency: values[3],
            });
        }

        Ok(records)
    }
}

/// The fund name at the start of a fund header line.
pub fn fund_name(line: &str, index: usize) -> Result<String, ExtractError> {
    FUND_NAME_RE
        .find(line)
        .map(|m| m.as_str().trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or(ExtractError::MissingField {
            field: "fund name",
            line: index,
        })
}

/// Merges rows describing the same fund on the same statement date.
///
/// Units and values are summed, the unit price is averaged. Output keeps the
/// order in which each fund first appeared.
pub fn aggregate_summaries(records: Vec<SummaryRecord>) -> Vec<SummaryRecord> {
    type Key = (String, NaiveDate, Option<crate::models::AccountBucket>, String);

    let mut order: Vec<Key> = Vec::new();
    let mut groups: HashMap<Key, (SummaryRecord, Decimal, u32)> = HashMap::new();

    for record in records {
        let key = (
            record.report_month.clone(),
            record.as_of_date,
            record.account_type,
            record.fund_name.clone(),
        );
        match groups.get_mut(&key) {
            Some((merged, price_sum, count)) => {
                merged.units += record.units;
                merged.value_fund_currency += record.value_fund_currency;
                merged.value_reporting_currency += record.value_reporting_currency;
                *price_sum += record.unit_price_fund_currency;
                *count += 1;
            }
            None => {
                order.push(key.clone());
                let price = record.unit_price_fund_currency;
                groups.insert(key, (record, price, 1));
            }
        }
    }

    order
        .into_iter()
        .filter_map(|key| groups.remove(&key))
        .map(|(mut merged, price_sum, count)| {
            merged.unit_price_fund_currency = price_sum / Decimal::from(count);
            merged
        })
        .collect()
}

// --- Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::markers::MarkerMatcher;
    use crate::extractors::tokens::NegativeConvention;
    use rust_decimal_macros::dec;

    fn markers() -> MarkerSet {
        MarkerSet::new().with(
            MarkerKind::FundHeader,
            MarkerMatcher::pattern(r"(SGDH? Acc|EUR Acc)").unwrap(),
        )
    }

    fn tokens() -> TokenPattern {
        TokenPattern::new(r"([0-9\s,./\-]+)", &[], NegativeConvention::EmbeddedMinus).unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, 31).unwrap()
    }

    fn record(fund: &str, units: Decimal, price: Decimal, value: Decimal) -> SummaryRecord {
        SummaryRecord {
            report_month: "2024-10".to_string(),
            as_of_date: date(),
            account_type: None,
            policy_number: None,
            fund_name: fund.to_string(),
            units,
            unit_price_fund_currency: price,
            value_fund_currency: value,
            value_reporting_currency: value,
        }
    }

    #[test]
    fn test_scan_halts_at_first_non_fund_line_after_block() {
        let lines = LineSequence::from_lines([
            "Initial Unit Account",
            "Fund Units Price Value Value (SGD)",
            "Global Equity Fund SGD Acc 10.000 1.50 15.00 15.00",
            "Asia Bond Fund EUR Acc 5.000 2.00 10.00 14.60",
            "Total 29.60",
            "Tech Fund SGDH Acc 1.000 1.00 1.00 1.00",
            "",
            "",
            "",
            "",
        ]);
        let extractor_markers = markers();
        let extractor_tokens = tokens();
        let extractor = SectionExtractor::new(&extractor_markers, &extractor_tokens);

        let rows = extractor.extract_summary(&lines, 0..10, date()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].fund_name, "Global Equity Fund SGD Acc");
        assert_eq!(rows[0].units, dec!(10.000));
        assert_eq!(rows[0].unit_price_fund_currency, dec!(1.50));
        assert_eq!(rows[1].fund_name, "Asia Bond Fund EUR Acc");
        assert_eq!(rows[1].value_fund_currency, dec!(10.00));
        assert_eq!(rows[1].value_reporting_currency, dec!(14.60));
        assert_eq!(rows[1].report_month, "2024-10");
    }

    #[test]
    fn test_section_without_funds_is_empty() {
        let lines = LineSequence::from_lines(["Initial Unit Account", "No holdings", "Total 0.00"]);
        let m = markers();
        let t = tokens();
        let rows = SectionExtractor::new(&m, &t)
            .extract_summary(&lines, 0..3, date())
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_missing_footer_is_tolerated() {
        let lines = LineSequence::from_lines([
            "Initial Unit Account",
            "Global Equity Fund SGD Acc 10.000 1.50 15.00 15.00",
        ]);
        let m = markers();
        let t = tokens();
        let rows = SectionExtractor::new(&m, &t)
            .extract_summary(&lines, 0..2, date())
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_short_fund_line_is_field_count_error() {
        let lines = LineSequence::from_lines([
            "Initial Unit Account",
            "Global Equity Fund SGD Acc 10.000 1.50",
        ]);
        let m = markers();
        let t = tokens();
        let err = SectionExtractor::new(&m, &t)
            .extract_summary(&lines, 0..2, date())
            .unwrap_err();
        assert_eq!(
            err,
            ExtractError::FieldCount {
                expected: 4,
                found: 2,
                line: 1
            }
        );
    }

    #[test]
    fn test_fund_name_requires_leading_text() {
        assert_eq!(
            fund_name("1,000 SGD Acc", 7).unwrap_err(),
            ExtractError::MissingField {
                field: "fund name",
                line: 7
            }
        );
    }

    #[test]
    fn test_aggregate_sums_flows_and_averages_price() {
        let merged = aggregate_summaries(vec![
            record("Global Equity Fund", dec!(10), dec!(1.50), dec!(15.00)),
            record("Asia Bond Fund", dec!(1), dec!(2.00), dec!(2.00)),
            record("Global Equity Fund", dec!(5), dec!(1.60), dec!(8.00)),
        ]);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].fund_name, "Global Equity Fund");
        assert_eq!(merged[0].units, dec!(15));
        assert_eq!(merged[0].unit_price_fund_currency, dec!(1.55));
        assert_eq!(merged[0].value_reporting_currency, dec!(23.00));
        assert_eq!(merged[1].fund_name, "Asia Bond Fund");
    }
}
