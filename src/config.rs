// src/config.rs
//! Layout vocabularies and patterns.
//!
//! Defaults describe the statement layouts this crate knows. A JSON file may
//! override any subset of fields; missing fields keep their defaults.

use crate::extractors::records::TransactionField;
use crate::extractors::tokens::{NegativeConvention, TokenPattern};
use crate::utils::error::{AppError, ExtractError};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    pub goals: GoalsConfig,
    pub insurance: InsuranceConfig,
    pub brokerage: BrokerageConfig,
    pub spreadsheet: SpreadsheetConfig,
}

impl ParserConfig {
    /// Loads overrides from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: ParserConfig = serde_json::from_str(&raw).map_err(|e| {
            AppError::Config(format!("Invalid config file '{}': {}", path.display(), e))
        })?;
        tracing::debug!("Loaded parser config from {}", path.display());
        Ok(config)
    }
}

/// Value-token pattern plus its currency prefixes and sign convention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    pub pattern: String,
    #[serde(default)]
    pub currency_prefixes: Vec<String>,
    #[serde(default)]
    pub negative: NegativeConvention,
}

impl TokenConfig {
    pub fn compile(&self) -> Result<TokenPattern, ExtractError> {
        TokenPattern::new(&self.pattern, &self.currency_prefixes, self.negative)
    }
}

/// What to do with a goal row whose text names no known source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFallback {
    /// Reuse the source of the previous row of the same goal; rows before any
    /// source has been seen are rejected.
    #[default]
    CarryOver,
    /// Every row must name its source.
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoalsConfig {
    /// Lines equal to one of these start a goal block.
    pub goals: Vec<String>,
    /// Source keywords; the leftmost one found in a row wins, ties going to
    /// the earlier entry. Must not be empty.
    pub sources: Vec<String>,
    /// A page is used only if it contains all of these (case-insensitive).
    pub phrases: Vec<String>,
    pub total_marker: String,
    pub tokens: TokenConfig,
    pub source_fallback: SourceFallback,
}

impl Default for GoalsConfig {
    fn default() -> Self {
        Self {
            goals: vec![
                "Retirement".to_string(),
                "Emergency Fund".to_string(),
                "Education".to_string(),
                "General Investing".to_string(),
            ],
            sources: vec!["SGD Cash".to_string(), "SRS".to_string(), "CPF OA".to_string()],
            phrases: Vec::new(),
            total_marker: "Total".to_string(),
            tokens: TokenConfig {
                pattern: r"-?S\$\d{1,3}(?:,\d{3})*\.\d{2}".to_string(),
                currency_prefixes: vec!["S$".to_string()],
                negative: NegativeConvention::EmbeddedMinus,
            },
            source_fallback: SourceFallback::CarryOver,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InsuranceConfig {
    pub phrases: Vec<String>,
    pub initial_units_titles: Vec<String>,
    pub accumulation_units_titles: Vec<String>,
    pub fund_header: String,
    pub open_balance: String,
    pub close_balance: String,
    /// Must capture the identifier in its first group.
    pub policy_number: String,
    /// Must capture the date text in its first group.
    pub statement_date: Option<String>,
    /// Currency codes that may be split from the account word by a line break.
    pub split_header_currencies: Vec<String>,
    pub tokens: TokenConfig,
    pub transaction_columns: Vec<TransactionField>,
}

impl Default for InsuranceConfig {
    fn default() -> Self {
        Self {
            phrases: Vec::new(),
            initial_units_titles: vec!["Initial Units Account".to_string()],
            accumulation_units_titles: vec!["Accumulation Units Account".to_string()],
            fund_header: r"(SGD(H?) Acc|EUR Acc)".to_string(),
            open_balance: r"(Opening\sBalance\s\.?\d+)".to_string(),
            close_balance: r"(Closing\sBalance\s\.?\d+)".to_string(),
            policy_number: r"Policy\s+(?:No\.?|Number)\s*:?\s*([A-Z0-9][A-Z0-9\-]*)".to_string(),
            statement_date: Some(r"(?i)statement\s+date\s*:?\s*(.+)$".to_string()),
            split_header_currencies: vec!["SGD".to_string(), "SGDH".to_string(), "EUR".to_string()],
            tokens: TokenConfig {
                pattern: r"([0-9\s,./\-]+)".to_string(),
                currency_prefixes: Vec::new(),
                negative: NegativeConvention::EmbeddedMinus,
            },
            transaction_columns: vec![
                TransactionField::Units,
                TransactionField::UnitPrice,
                TransactionField::FxRate,
                TransactionField::ValueReporting,
                TransactionField::ValueFund,
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerageConfig {
    pub phrases: Vec<String>,
    pub section_start: String,
    pub section_end: String,
    /// Date-leading line of a trade; first group is the ISO date.
    pub trade_date: String,
    /// Line after the date: ticker in group 1, numeric tuple in group 2.
    pub trade_values: String,
    pub tokens: TokenConfig,
    pub statement_date: Option<String>,
    pub ignored_tickers: Vec<String>,
}

impl Default for BrokerageConfig {
    fn default() -> Self {
        Self {
            phrases: Vec::new(),
            section_start: "Stocks".to_string(),
            section_end: "Equity and Index Options".to_string(),
            trade_date: r"^(\d{4}-\d{2}-\d{2})".to_string(),
            trade_values: r"^([A-Z][A-Z0-9.]*)\s+((?:-?[\d,]+(?:\.\d+)?\s+){7}-?[\d,]+(?:\.\d+)?)"
                .to_string(),
            tokens: TokenConfig {
                pattern: r"-?[\d,]+(?:\.\d+)?".to_string(),
                currency_prefixes: Vec::new(),
                negative: NegativeConvention::EmbeddedMinus,
            },
            statement_date: Some(
                r"(?i)activity statement.*?([A-Za-z]+ \d{1,2}, \d{4})\s*$".to_string(),
            ),
            ignored_tickers: default_ignored_tickers(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpreadsheetConfig {
    pub products: Vec<String>,
    pub currency: String,
    pub trade_date_column: String,
    pub trade_date_format: String,
    pub symbol_column: String,
    pub event_column: String,
    pub quantity_column: String,
    pub price_column: String,
    pub product_column: String,
    pub ignored_tickers: Vec<String>,
}

impl Default for SpreadsheetConfig {
    fn default() -> Self {
        Self {
            products: vec!["Etf".to_string(), "Stock".to_string(), "Etn".to_string()],
            currency: "USD".to_string(),
            trade_date_column: "Trade Date".to_string(),
            trade_date_format: "%d-%b-%Y %H:%M:%S".to_string(),
            symbol_column: "Instrument Symbol".to_string(),
            event_column: "Event".to_string(),
            quantity_column: "Quantity".to_string(),
            price_column: "Price".to_string(),
            product_column: "Product".to_string(),
            ignored_tickers: default_ignored_tickers(),
        }
    }
}

/// Tickers dropped from trade tables (splits, mergers, delistings).
fn default_ignored_tickers() -> Vec<String> {
    ["APHA", "ACB", "CNTTQ", "HEXO", "IPOE", "UNG", "TELL"]
        .iter()
        .map(|t| t.to_string())
        .collect()
}
