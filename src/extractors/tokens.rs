// src/extractors/tokens.rs

// --- Imports ---
use crate::utils::error::ExtractError;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How a layout prints negative amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegativeConvention {
    /// A minus anywhere in the token makes it negative (`123.45-`, `-123.45`).
    #[default]
    EmbeddedMinus,
    /// Accounting brackets, `(123.45)`. A plain leading minus is still honoured.
    Parentheses,
    /// Amounts are printed unsigned; any minus is stray punctuation.
    Unsigned,
}

/// The "value token" pattern of one layout plus the rules for turning its
/// matches into decimals.
#[derive(Debug, Clone)]
pub struct TokenPattern {
    value: Regex,
    currency_prefixes: Vec<String>,
    negative: NegativeConvention,
}

impl TokenPattern {
    pub fn new(
        pattern: &str,
        currency_prefixes: &[String],
        negative: NegativeConvention,
    ) -> Result<Self, ExtractError> {
        let value = Regex::new(pattern)
            .map_err(|e| ExtractError::RegexError(format!("value token '{}': {}", pattern, e)))?;
        Ok(Self {
            value,
            currency_prefixes: currency_prefixes.to_vec(),
            negative,
        })
    }

    /// Extracts every numeric value on `line`, left to right.
    ///
    /// A single pattern match may hold several space-separated columns; those
    /// are split into separate values. Sub-tokens that do not convert (dates,
    /// lone punctuation) are dropped.
    pub fn parse_line(&self, line: &str) -> Vec<Decimal> {
        let joined = self
            .value
            .find_iter(line)
            .map(|m| m.as_str().trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        joined
            .split_whitespace()
            .filter_map(|token| self.convert(token))
            .collect()
    }

    fn convert(&self, token: &str) -> Option<Decimal> {
        let mut cleaned = token.to_string();
        for prefix in &self.currency_prefixes {
            cleaned = cleaned.replace(prefix.as_str(), "");
        }
        cleaned.retain(|c| c != ',');

        let negative = match self.negative {
            NegativeConvention::EmbeddedMinus | NegativeConvention::Unsigned => {
                let had_minus = cleaned.contains('-');
                cleaned.retain(|c| c != '-');
                had_minus && self.negative == NegativeConvention::EmbeddedMinus
            }
            NegativeConvention::Parentheses => {
                if cleaned.len() >= 2 && cleaned.starts_with('(') && cleaned.ends_with(')') {
                    cleaned = cleaned[1..cleaned.len() - 1].to_string();
                    true
                } else {
                    false
                }
            }
        };

        match Decimal::from_str(&cleaned) {
            Ok(value) if negative => Some(-value),
            Ok(value) => Some(value),
            Err(_) => {
                tracing::trace!("Dropping non-numeric value token '{}'", token);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn insurance_tokens() -> TokenPattern {
        TokenPattern::new(r"([0-9\s,./\-]+)", &[], NegativeConvention::EmbeddedMinus).unwrap()
    }

    #[test]
    fn test_thousands_separator_and_order() {
        let values = insurance_tokens().parse_line("Global Equity Fund SGD Acc 1,234.56 1.5000 99.10");
        assert_eq!(values, vec![dec!(1234.56), dec!(1.5000), dec!(99.10)]);
    }

    #[test]
    fn test_trailing_and_leading_minus() {
        let values = insurance_tokens().parse_line("Policy Charge 123.45- -123.45");
        assert_eq!(values, vec![dec!(-123.45), dec!(-123.45)]);
    }

    #[test]
    fn test_unparseable_residue_is_dropped_without_aborting() {
        let values = insurance_tokens().parse_line("15/10/2024 Switch In - 2.000 . 3.50");
        assert_eq!(values, vec![dec!(2.000), dec!(3.50)]);
    }

    #[test]
    fn test_currency_prefix_stripped() {
        let tokens = TokenPattern::new(
            r"-?S\$\d{1,3}(?:,\d{3})*\.\d{2}",
            &["S$".to_string()],
            NegativeConvention::EmbeddedMinus,
        )
        .unwrap();
        let values = tokens.parse_line("SGD Cash S$1,000.00 S$500.00 -S$12.50");
        assert_eq!(values, vec![dec!(1000.00), dec!(500.00), dec!(-12.50)]);
    }

    #[test]
    fn test_parentheses_convention() {
        let tokens = TokenPattern::new(
            r"\(?-?[\d,]+\.\d+\)?",
            &[],
            NegativeConvention::Parentheses,
        )
        .unwrap();
        let values = tokens.parse_line("Fees (1,234.56) 10.00 -2.00");
        assert_eq!(values, vec![dec!(-1234.56), dec!(10.00), dec!(-2.00)]);
    }

    #[test]
    fn test_unsigned_convention_ignores_minus() {
        let tokens = TokenPattern::new(r"[\d,.\-]+", &[], NegativeConvention::Unsigned).unwrap();
        assert_eq!(tokens.parse_line("Redemption 50.00-"), vec![dec!(50.00)]);
    }

    #[test]
    fn test_line_without_tokens_is_empty() {
        assert!(insurance_tokens().parse_line("Closing Remarks").is_empty());
    }

    #[test]
    fn test_invalid_pattern_is_regex_error() {
        let err = TokenPattern::new("([0-9", &[], NegativeConvention::EmbeddedMinus).unwrap_err();
        assert!(matches!(err, ExtractError::RegexError(_)));
    }
}
