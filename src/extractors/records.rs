// src/extractors/records.rs

// --- Imports ---
use crate::extractors::markers::{LineSequence, MarkerKind, MarkerMatcher, MarkerSet};
use crate::extractors::tokens::TokenPattern;
use crate::models::{report_month, AccountBucket, TransactionRecord};
use crate::utils::error::ExtractError;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// --- Regex Patterns (Lazy Static) ---
// Transaction rows open with a dd/mm/yyyy date.
static TRX_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{2}/\d{2}/\d{4}").expect("Failed to compile TRX_DATE_RE")
});

// First alphabetic run after the date, e.g. "Premium Allocation".
static TRX_TYPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z][A-Za-z\s]*").expect("Failed to compile TRX_TYPE_RE")
});

/// Meaning of one positional numeric value on a transaction row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionField {
    Units,
    UnitPrice,
    FxRate,
    ValueReporting,
    ValueFund,
    Ignore,
}

/// Walks fund ranges and emits one record per row between an opening and a
/// closing balance line.
pub struct RecordBlockExtractor<'a> {
    open: &'a MarkerMatcher,
    close: &'a MarkerMatcher,
    tokens: &'a TokenPattern,
    columns: &'a [TransactionField],
}

impl<'a> RecordBlockExtractor<'a> {
    pub fn new(
        markers: &'a MarkerSet,
        tokens: &'a TokenPattern,
        columns: &'a [TransactionField],
    ) -> Result<Self, ExtractError> {
        for required in [
            TransactionField::Units,
            TransactionField::UnitPrice,
            TransactionField::ValueReporting,
        ] {
            if !columns.contains(&required) {
                return Err(ExtractError::InvalidBinding(format!(
                    "transaction columns must bind {:?}",
                    required
                )));
            }
        }
        Ok(Self {
            open: markers.matcher(MarkerKind::OpenBalance)?,
            close: markers.matcher(MarkerKind::CloseBalance)?,
            tokens,
            columns,
        })
    }

    /// `fund_starts` holds the header line of every fund in ascending order,
    /// followed by one past-the-end sentinel. Each consecutive pair bounds one
    /// fund; its first line is the fund name.
    ///
    /// Funds without an opening balance line contribute nothing. Every
    /// non-blank line inside a block must start with a date and name a
    /// transaction type.
    pub fn extract_transactions(
        &self,
        lines: &LineSequence,
        fund_starts: &[usize],
        bucket: AccountBucket,
    ) -> Result<Vec<TransactionRecord>, ExtractError> {
        let mut records = Vec::new();

        for pair in fund_starts.windows(2) {
            let (start, end) = (pair[0], pair[1]);
            lines.check_range(&(start..end))?;
            let fund_name = lines.get(start)?.trim().to_string();

            let mut index = start;
            while index < end {
                if self.open.is_match(lines.get(index)?) {
                    index = self.read_block(lines, index, end, &fund_name, bucket, &mut records)?;
                }
                index += 1;
            }
        }

        tracing::debug!("Extracted {} {} transactions", records.len(), bucket);
        Ok(records)
    }

    /// Reads the rows after the opening balance at `open_index`; returns the
    /// index of the closing balance line.
    fn read_block(
        &self,
        lines: &LineSequence,
        open_index: usize,
        end: usize,
        fund_name: &str,
        bucket: AccountBucket,
        records: &mut Vec<TransactionRecord>,
    ) -> Result<usize, ExtractError> {
        let mut cursor = open_index + 1;
        loop {
            if cursor >= end {
                return Err(ExtractError::MarkerNotFound(format!(
                    "closing balance for fund '{}' (opening balance at line {})",
                    fund_name, open_index
                )));
            }
            let line = lines.get(cursor)?;
            if self.close.is_match(line) {
                return Ok(cursor);
            }

            if line.trim().is_empty() {
                cursor += 1;
                continue;
            }

            let (transaction_date, rest) = transaction_date(line, cursor)?;
            let transaction_type = TRX_TYPE_RE
                .find(rest)
                .map(|m| m.as_str().trim().to_string())
                .ok_or(ExtractError::MissingField {
                    field: "transaction type",
                    line: cursor,
                })?;

            let values = self.tokens.parse_line(rest);
            records.push(self.bind(
                &values,
                cursor,
                fund_name,
                bucket,
                transaction_date,
                transaction_type,
            )?);
            cursor += 1;
        }
    }

    fn bind(
        &self,
        values: &[Decimal],
        line: usize,
        fund_name: &str,
        bucket: AccountBucket,
        transaction_date: NaiveDate,
        transaction_type: String,
    ) -> Result<TransactionRecord, ExtractError> {
        if values.len() < self.columns.len() {
            return Err(ExtractError::FieldCount {
                expected: self.columns.len(),
                found: values.len(),
                line,
            });
        }

        let mut units = Decimal::ZERO;
        let mut unit_price = Decimal::ZERO;
        let mut value_reporting = Decimal::ZERO;
        let mut value_fund = None;
        let mut fx_rate = None;
        for (field, value) in self.columns.iter().zip(values) {
            match field {
                TransactionField::Units => units = *value,
                TransactionField::UnitPrice => unit_price = *value,
                TransactionField::FxRate => fx_rate = Some(*value),
                TransactionField::ValueReporting => value_reporting = *value,
                TransactionField::ValueFund => value_fund = Some(*value),
                TransactionField::Ignore => {}
            }
        }

        Ok(TransactionRecord {
            report_month: report_month(transaction_date),
            transaction_date,
            account_type: bucket,
            policy_number: None,
            fund_name: fund_name.to_string(),
            transaction_type,
            units,
            unit_price_fund_currency: unit_price,
            // Single-currency layouts print one value column.
            value_fund_currency: value_fund.unwrap_or(value_reporting),
            value_reporting_currency: value_reporting,
            fx_rate,
        })
    }
}

/// The leading dd/mm/yyyy date of a transaction row and the text after it.
fn transaction_date(line: &str, index: usize) -> Result<(NaiveDate, &str), ExtractError> {
    let m = TRX_DATE_RE.find(line).ok_or(ExtractError::MissingField {
        field: "transaction date",
        line: index,
    })?;
    let date = NaiveDate::parse_from_str(m.as_str(), "%d/%m/%Y").map_err(|e| {
        ExtractError::InvalidDate {
            value: m.as_str().to_string(),
            reason: e.to_string(),
        }
    })?;
    Ok((date, &line[m.end()..]))
}

// --- Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::tokens::NegativeConvention;
    use rust_decimal_macros::dec;

    const COLUMNS: [TransactionField; 5] = [
        TransactionField::Units,
        TransactionField::UnitPrice,
        TransactionField::FxRate,
        TransactionField::ValueReporting,
        TransactionField::ValueFund,
    ];

    fn markers() -> MarkerSet {
        MarkerSet::new()
            .with(
                MarkerKind::OpenBalance,
                MarkerMatcher::pattern(r"(Opening\sBalance\s\.?\d+)").unwrap(),
            )
            .with(
                MarkerKind::CloseBalance,
                MarkerMatcher::pattern(r"(Closing\sBalance\s\.?\d+)").unwrap(),
            )
    }

    fn tokens() -> TokenPattern {
        TokenPattern::new(r"([0-9\s,./\-]+)", &[], NegativeConvention::EmbeddedMinus).unwrap()
    }

    fn detail_lines() -> LineSequence {
        LineSequence::from_lines([
            "Global Equity Fund SGD Acc",
            "Date Transaction Units Unit Price FX Rate Value (SGD) Value (Fund Currency)",
            "Opening Balance 900.000",
            "01/10/2024 Premium Allocation 100.000 1.5000 1.0000 150.00 150.00",
            "15/10/2024 Policy Charge 2.000- 1.5000 1.0000 3.00- 3.00-",
            "28/10/2024 Switch In 10.000 1.4000 1.0000 14.00 14.00",
            "Closing Balance 1,008.000",
            "Asia Bond Fund EUR Acc",
            "No transactions this period",
        ])
    }

    #[test]
    fn test_three_rows_between_balances() {
        let m = markers();
        let t = tokens();
        let extractor = RecordBlockExtractor::new(&m, &t, &COLUMNS).unwrap();

        let rows = extractor
            .extract_transactions(&detail_lines(), &[0, 7, 9], AccountBucket::InitialUnits)
            .unwrap();

        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.fund_name == "Global Equity Fund SGD Acc"));
        assert!(rows.iter().all(|r| r.account_type == AccountBucket::InitialUnits));
        assert_eq!(rows[0].transaction_type, "Premium Allocation");
        assert_eq!(rows[0].transaction_date, NaiveDate::from_ymd_opt(2024, 10, 1).unwrap());
        assert_eq!(rows[0].fx_rate, Some(dec!(1.0000)));
        assert_eq!(rows[1].transaction_type, "Policy Charge");
        assert_eq!(rows[1].units, dec!(-2.000));
        assert_eq!(rows[1].value_reporting_currency, dec!(-3.00));
        assert_eq!(rows[2].unit_price_fund_currency, dec!(1.4000));
    }

    #[test]
    fn test_fund_without_opening_balance_yields_nothing() {
        let m = markers();
        let t = tokens();
        let extractor = RecordBlockExtractor::new(&m, &t, &COLUMNS).unwrap();

        let rows = extractor
            .extract_transactions(&detail_lines(), &[7, 9], AccountBucket::AccumulationUnits)
            .unwrap();

        assert!(rows.is_empty());
    }

    #[test]
    fn test_missing_closing_balance_is_structural_error() {
        let lines = LineSequence::from_lines([
            "Global Equity Fund SGD Acc",
            "Opening Balance 900.000",
            "01/10/2024 Premium Allocation 100.000 1.5000 1.0000 150.00 150.00",
        ]);
        let m = markers();
        let t = tokens();
        let extractor = RecordBlockExtractor::new(&m, &t, &COLUMNS).unwrap();

        let err = extractor
            .extract_transactions(&lines, &[0, 3], AccountBucket::InitialUnits)
            .unwrap_err();

        assert!(matches!(err, ExtractError::MarkerNotFound(ref msg) if msg.contains("closing balance")));
    }

    #[test]
    fn test_row_without_date_is_fatal() {
        let lines = LineSequence::from_lines([
            "Global Equity Fund SGD Acc",
            "Opening Balance 900.000",
            "Premium Allocation 100.000 1.5000 1.0000 150.00 150.00",
            "Closing Balance 1,000.000",
        ]);
        let m = markers();
        let t = tokens();
        let extractor = RecordBlockExtractor::new(&m, &t, &COLUMNS).unwrap();

        let err = extractor
            .extract_transactions(&lines, &[0, 4], AccountBucket::InitialUnits)
            .unwrap_err();

        assert_eq!(
            err,
            ExtractError::MissingField {
                field: "transaction date",
                line: 2
            }
        );
    }

    #[test]
    fn test_row_without_type_is_fatal() {
        let lines = LineSequence::from_lines([
            "Global Equity Fund SGD Acc",
            "Opening Balance 900.000",
            "01/10/2024 100.000 1.5000 1.0000 150.00 150.00",
            "Closing Balance 1,000.000",
        ]);
        let m = markers();
        let t = tokens();
        let extractor = RecordBlockExtractor::new(&m, &t, &COLUMNS).unwrap();

        let err = extractor
            .extract_transactions(&lines, &[0, 4], AccountBucket::InitialUnits)
            .unwrap_err();

        assert_eq!(
            err,
            ExtractError::MissingField {
                field: "transaction type",
                line: 2
            }
        );
    }

    #[test]
    fn test_binding_without_units_is_rejected() {
        let m = markers();
        let t = tokens();
        let columns = [TransactionField::UnitPrice, TransactionField::ValueReporting];
        assert!(matches!(
            RecordBlockExtractor::new(&m, &t, &columns),
            Err(ExtractError::InvalidBinding(_))
        ));
    }

    #[test]
    fn test_single_value_column_fills_fund_currency() {
        let lines = LineSequence::from_lines([
            "Global Equity Fund SGD Acc",
            "Opening Balance 900.000",
            "01/10/2024 Premium Allocation 100.000 1.5000 150.00",
            "Closing Balance 1,000.000",
        ]);
        let m = markers();
        let t = tokens();
        let columns = [
            TransactionField::Units,
            TransactionField::UnitPrice,
            TransactionField::ValueReporting,
        ];
        let extractor = RecordBlockExtractor::new(&m, &t, &columns).unwrap();

        let rows = extractor
            .extract_transactions(&lines, &[0, 4], AccountBucket::InitialUnits)
            .unwrap();

        assert_eq!(rows[0].value_fund_currency, dec!(150.00));
        assert_eq!(rows[0].fx_rate, None);
    }

    #[test]
    fn test_blank_lines_inside_block_are_ignored() {
        let lines = LineSequence::from_lines([
            "Global Equity Fund SGD Acc",
            "Opening Balance 900.000",
            "",
            "01/10/2024 Premium Allocation 100.000 1.5000 1.0000 150.00 150.00",
            "Closing Balance 1,000.000",
        ]);
        let m = markers();
        let t = tokens();
        let extractor = RecordBlockExtractor::new(&m, &t, &COLUMNS).unwrap();

        let rows = extractor
            .extract_transactions(&lines, &[0, 5], AccountBucket::InitialUnits)
            .unwrap();
        assert_eq!(rows.len(), 1);
    }
}
