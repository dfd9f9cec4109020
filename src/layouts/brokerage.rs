// src/layouts/brokerage.rs
//! Brokerage activity statement, text export.
//!
//! Stock trades sit between the "Stocks" and "Equity and Index Options"
//! titles. Each trade is a date-leading line followed by a line with the
//! ticker and eight numbers: quantity, trade price, closing price, proceeds,
//! commission, basis, realized P/L and MTM P/L.

use super::{finalize, flag_if_empty, Layout, StatementTables, TextLayout};
use crate::config::BrokerageConfig;
use crate::extractors::markers::{LineSequence, MarkerKind, MarkerMatcher, MarkerSet};
use crate::extractors::tokens::TokenPattern;
use crate::models::{StatementContext, TradeDirection, TradeRow};
use crate::source::build_line_sequence;
use crate::utils::error::ExtractError;
use chrono::NaiveDate;
use regex::Regex;
use std::ops::Range;

const TRADE_FIELDS: usize = 8;

pub struct BrokerageLayout {
    markers: MarkerSet,
    phrases: Vec<String>,
    section_start: String,
    section_end: String,
    trade_date: Regex,
    trade_values: Regex,
    tokens: TokenPattern,
    statement_date: Option<Regex>,
    ignored_tickers: Vec<String>,
}

impl BrokerageLayout {
    pub fn from_config(config: &BrokerageConfig) -> Result<Self, ExtractError> {
        let markers = MarkerSet::new()
            .with(MarkerKind::SectionStart, MarkerMatcher::exact([config.section_start.as_str()]))
            .with(MarkerKind::SectionEnd, MarkerMatcher::exact([config.section_end.as_str()]))
            .with(MarkerKind::RecordStart, MarkerMatcher::pattern(&config.trade_date)?);

        Ok(Self {
            markers,
            phrases: config.phrases.clone(),
            section_start: config.section_start.clone(),
            section_end: config.section_end.clone(),
            trade_date: compile(&config.trade_date)?,
            trade_values: compile(&config.trade_values)?,
            tokens: config.tokens.compile()?,
            statement_date: config.statement_date.as_deref().map(compile).transpose()?,
            ignored_tickers: config.ignored_tickers.clone(),
        })
    }

    /// Lines strictly between the first end title and the last section
    /// title printed before it.
    fn section(&self, lines: &LineSequence) -> Result<Range<usize>, ExtractError> {
        let end = self
            .markers
            .locate(lines, MarkerKind::SectionEnd, 0..lines.len())?
            .first()
            .copied()
            .ok_or_else(|| ExtractError::MarkerNotFound(format!("'{}' section title", self.section_end)))?;
        let start = self
            .markers
            .locate(lines, MarkerKind::SectionStart, 0..end)?
            .last()
            .copied()
            .ok_or_else(|| ExtractError::MarkerNotFound(format!("'{}' section title", self.section_start)))?;
        Ok((start + 1)..end)
    }

    pub fn extract(
        &self,
        lines: &LineSequence,
        ctx: &StatementContext,
    ) -> Result<Vec<TradeRow>, ExtractError> {
        let section = self.section(lines)?;
        tracing::debug!("Stock trades section at lines {:?}", section);

        let mut rows = Vec::new();
        for index in self
            .markers
            .locate(lines, MarkerKind::RecordStart, section.clone())?
        {
            let next = index + 1;
            if next >= section.end {
                return Err(ExtractError::IndexOutOfRange {
                    index: next,
                    len: section.end,
                });
            }
            let values_line = lines.get(next)?;
            let Some(caps) = self.trade_values.captures(values_line) else {
                tracing::debug!("Line {} after trade date is not a trade: '{}'", next, values_line);
                continue;
            };

            let create_date = self.trade_date(lines.get(index)?, index)?;
            let ticker = caps.get(1).map(|m| m.as_str().to_string()).ok_or(
                ExtractError::MissingField {
                    field: "ticker",
                    line: next,
                },
            )?;
            let values = caps
                .get(2)
                .map(|m| self.tokens.parse_line(m.as_str()))
                .unwrap_or_default();
            if values.len() < TRADE_FIELDS {
                return Err(ExtractError::FieldCount {
                    expected: TRADE_FIELDS,
                    found: values.len(),
                    line: next,
                });
            }
            tracing::trace!("Trade {} on {}: {:?}", ticker, create_date, values);

            rows.push(TradeRow {
                report_date: None,
                holdings: ticker,
                units: values[0],
                unit_price_usd: values[1],
                create_date,
                transaction_type: TradeDirection::from_units(values[0]),
            });
        }

        let rows = finalize(rows, ctx, &self.ignored_tickers);
        flag_if_empty(Layout::Brokerage, ctx, rows.len());
        Ok(rows)
    }

    fn trade_date(&self, line: &str, index: usize) -> Result<NaiveDate, ExtractError> {
        let text = self
            .trade_date
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .ok_or(ExtractError::MissingField {
                field: "trade date",
                line: index,
            })?;
        NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|e| ExtractError::InvalidDate {
            value: text.to_string(),
            reason: e.to_string(),
        })
    }
}

impl TextLayout for BrokerageLayout {
    fn layout(&self) -> Layout {
        Layout::Brokerage
    }

    fn markers(&self) -> &MarkerSet {
        &self.markers
    }

    fn line_sequence(&self, pages: &[String]) -> LineSequence {
        build_line_sequence(pages, &self.phrases)
    }

    fn statement_date_pattern(&self) -> Option<&Regex> {
        self.statement_date.as_ref()
    }

    fn extract_tables(
        &self,
        lines: &LineSequence,
        ctx: &StatementContext,
    ) -> Result<StatementTables, ExtractError> {
        tracing::info!("Parsing brokerage statement {} ({} lines)", ctx.source_file, lines.len());
        Ok(StatementTables::Trades(self.extract(lines, ctx)?))
    }
}

/// Stock trades of one activity statement.
pub fn extract(
    pages: &[String],
    config: &BrokerageConfig,
    ctx: &StatementContext,
) -> Result<StatementTables, ExtractError> {
    let layout = BrokerageLayout::from_config(config)?;
    let lines = layout.line_sequence(pages);
    layout.extract_tables(&lines, ctx)
}

fn compile(pattern: &str) -> Result<Regex, ExtractError> {
    Regex::new(pattern).map_err(|e| ExtractError::RegexError(format!("'{}': {}", pattern, e)))
}
