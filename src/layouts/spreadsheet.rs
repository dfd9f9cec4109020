// src/layouts/spreadsheet.rs
//! Brokerage trade export, one trade per spreadsheet row.
//!
//! Only listed products (stocks, ETFs, ETNs) priced in the reporting
//! currency are kept. `Price` holds "<amount> <currency>" and the instrument
//! symbol carries an exchange suffix ("AAPL:xnas").

use super::{finalize, flag_if_empty, Layout, StatementTables};
use crate::config::SpreadsheetConfig;
use crate::models::{StatementContext, TradeDirection, TradeRow};
use crate::source::{TabularReader, TabularRow};
use crate::utils::error::{AppError, ExtractError};
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Formats tried after the configured one; the xlsx reader renders date
/// cells as ISO timestamps.
const FALLBACK_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const FALLBACK_DATE_FORMAT: &str = "%Y-%m-%d";

/// Reads every row from `reader` and extracts the trades.
pub fn extract<R: TabularReader + ?Sized>(
    reader: &R,
    config: &SpreadsheetConfig,
    ctx: &StatementContext,
) -> Result<StatementTables, AppError> {
    let rows = reader.read_rows()?;
    tracing::info!("Parsing trade export {} ({} rows)", ctx.source_file, rows.len());
    Ok(extract_rows(&rows, config, ctx)?)
}

pub fn extract_rows(
    rows: &[TabularRow],
    config: &SpreadsheetConfig,
    ctx: &StatementContext,
) -> Result<StatementTables, ExtractError> {
    let mut trades = Vec::new();

    for (index, row) in rows.iter().enumerate() {
        let product = row.get(&config.product_column)?.trim();
        if !config.products.iter().any(|p| p == product) {
            tracing::trace!("Skipping row {} with product '{}'", index, product);
            continue;
        }

        let price = row.get(&config.price_column)?;
        let mut parts = price.split_whitespace();
        let (amount, currency) = (parts.next(), parts.next());
        if currency != Some(config.currency.as_str()) {
            tracing::debug!("Skipping row {} priced in {:?}", index, currency);
            continue;
        }
        let unit_price_usd = parse_decimal(amount.unwrap_or_default(), index)?;

        let symbol = row.get(&config.symbol_column)?;
        let holdings = symbol.split(':').next().unwrap_or_default().trim().to_string();
        if holdings.is_empty() {
            return Err(ExtractError::MissingField {
                field: "instrument symbol",
                line: index,
            });
        }

        let transaction_type = if row.get(&config.event_column)?.contains("Buy") {
            TradeDirection::Bought
        } else {
            TradeDirection::Sold
        };

        trades.push(TradeRow {
            report_date: None,
            holdings,
            units: parse_decimal(row.get(&config.quantity_column)?, index)?,
            unit_price_usd,
            create_date: parse_trade_date(row.get(&config.trade_date_column)?, &config.trade_date_format)?,
            transaction_type,
        });
    }

    let trades = finalize(trades, ctx, &config.ignored_tickers);
    flag_if_empty(Layout::Spreadsheet, ctx, trades.len());
    Ok(StatementTables::Trades(trades))
}

fn parse_decimal(text: &str, line: usize) -> Result<Decimal, ExtractError> {
    let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
    Decimal::from_str(&cleaned).map_err(|_| ExtractError::InvalidNumber {
        value: text.to_string(),
        line,
    })
}

fn parse_trade_date(text: &str, format: &str) -> Result<NaiveDate, ExtractError> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, format)
        .or_else(|_| NaiveDateTime::parse_from_str(text, FALLBACK_DATETIME_FORMAT))
        .map(|dt| dt.date())
        .or_else(|_| NaiveDate::parse_from_str(text, FALLBACK_DATE_FORMAT))
        .map_err(|e| ExtractError::InvalidDate {
            value: text.to_string(),
            reason: e.to_string(),
        })
}
