// src/layouts/mod.rs
//! Per-issuer drivers. Each composes the marker and record primitives in the
//! fixed order its statement family prints them, then runs the shared
//! [`finalize`] step.

pub mod brokerage;
pub mod goals;
pub mod insurance;
pub mod spreadsheet;

use crate::extractors::markers::{LineSequence, MarkerSet};
use crate::models::{
    GoalBalanceRow, StatementContext, SummaryRecord, TradeRow, TransactionRecord,
};
use crate::utils::error::ExtractError;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// The statement families this crate understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Layout {
    /// Goals-based investment platform (balances per goal and funding source)
    Goals,
    /// Insurance wrapper with initial and accumulation unit accounts
    Insurance,
    /// Brokerage activity statement, text export
    Brokerage,
    /// Brokerage trade export, xlsx
    Spreadsheet,
}

impl Layout {
    pub fn as_str(&self) -> &'static str {
        match self {
            Layout::Goals => "goals",
            Layout::Insurance => "insurance",
            Layout::Brokerage => "brokerage",
            Layout::Spreadsheet => "spreadsheet",
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A layout parsed from page text. Implementations hold only compiled
/// configuration, so one value can parse any number of statements.
pub trait TextLayout {
    fn layout(&self) -> Layout;

    fn markers(&self) -> &MarkerSet;

    /// Page filtering, joining and any layout-specific text repair.
    fn line_sequence(&self, pages: &[String]) -> LineSequence;

    /// Pattern whose first group is the statement date printed in the body.
    fn statement_date_pattern(&self) -> Option<&Regex> {
        None
    }

    fn extract_tables(
        &self,
        lines: &LineSequence,
        ctx: &StatementContext,
    ) -> Result<StatementTables, ExtractError>;
}

/// A normalized output row.
pub trait StatementRow {
    /// Stamps statement-level facts onto the row.
    fn attach(&mut self, ctx: &StatementContext);

    /// Instrument symbol, for rows that can be excluded by ticker.
    fn instrument(&self) -> Option<&str> {
        None
    }
}

impl StatementRow for GoalBalanceRow {
    fn attach(&mut self, ctx: &StatementContext) {
        self.create_date = ctx.reporting_date;
        self.report_month = ctx.report_month();
    }
}

impl StatementRow for SummaryRecord {
    fn attach(&mut self, ctx: &StatementContext) {
        self.as_of_date = ctx.reporting_date;
        self.report_month = ctx.report_month();
        self.policy_number = ctx.account_id.clone();
    }
}

impl StatementRow for TransactionRecord {
    fn attach(&mut self, ctx: &StatementContext) {
        self.report_month = ctx.report_month();
        self.policy_number = ctx.account_id.clone();
    }
}

impl StatementRow for TradeRow {
    fn attach(&mut self, ctx: &StatementContext) {
        self.report_date = Some(ctx.reporting_date);
    }

    fn instrument(&self) -> Option<&str> {
        Some(&self.holdings)
    }
}

/// Drops ignored instruments and attaches the statement context.
pub fn finalize<R: StatementRow>(
    mut rows: Vec<R>,
    ctx: &StatementContext,
    ignored_instruments: &[String],
) -> Vec<R> {
    let ignored: HashSet<&str> = ignored_instruments.iter().map(String::as_str).collect();
    let before = rows.len();
    rows.retain(|row| row.instrument().map_or(true, |i| !ignored.contains(i)));
    if rows.len() != before {
        tracing::debug!("Dropped {} rows for ignored instruments", before - rows.len());
    }
    for row in rows.iter_mut() {
        row.attach(ctx);
    }
    rows
}

/// Logs the empty-result anomaly; some layouts legitimately have quiet periods.
pub(crate) fn flag_if_empty(layout: Layout, ctx: &StatementContext, rows: usize) {
    if rows == 0 {
        tracing::warn!("{} statement {} produced no rows", layout, ctx.source_file);
    }
}

/// The normalized tables produced from one statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementTables {
    Goals(Vec<GoalBalanceRow>),
    Insurance {
        summary: Vec<SummaryRecord>,
        transactions: Vec<TransactionRecord>,
    },
    Trades(Vec<TradeRow>),
}

impl StatementTables {
    /// Each table as (name, JSON array of rows).
    pub fn tables(&self) -> Result<Vec<(&'static str, serde_json::Value)>, serde_json::Error> {
        Ok(match self {
            StatementTables::Goals(rows) => vec![("goals", serde_json::to_value(rows)?)],
            StatementTables::Insurance {
                summary,
                transactions,
            } => vec![
                ("summary", serde_json::to_value(summary)?),
                ("transactions", serde_json::to_value(transactions)?),
            ],
            StatementTables::Trades(rows) => vec![("trades", serde_json::to_value(rows)?)],
        })
    }

    pub fn row_count(&self) -> usize {
        match self {
            StatementTables::Goals(rows) => rows.len(),
            StatementTables::Insurance {
                summary,
                transactions,
            } => summary.len() + transactions.len(),
            StatementTables::Trades(rows) => rows.len(),
        }
    }
}
