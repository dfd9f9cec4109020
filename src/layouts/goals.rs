// src/layouts/goals.rs
//! Goals-based investment platform.
//!
//! Each goal name sits on its own line, followed by one row per funding
//! source and a "Total" row:
//!
//! ```text
//! Retirement
//! SGD Cash S$1,000.00 S$500.00 S$0.00 S$25.50 S$1,525.50
//! SRS S$0.00 S$0.00 S$0.00 S$0.00 S$0.00
//! Total S$1,000.00 S$500.00 S$0.00 S$25.50 S$1,525.50
//! ```
//!
//! The five trailing amounts are start balance, investment, redemption,
//! gains/losses and end balance.

use super::{finalize, flag_if_empty, Layout, StatementTables, TextLayout};
use crate::config::{GoalsConfig, SourceFallback};
use crate::extractors::markers::{LineSequence, MarkerKind, MarkerMatcher, MarkerSet};
use crate::extractors::tokens::TokenPattern;
use crate::models::{GoalBalanceRow, StatementContext};
use crate::source::build_line_sequence;
use crate::utils::error::ExtractError;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

const BALANCE_FIELDS: usize = 5;

pub struct GoalsLayout {
    markers: MarkerSet,
    phrases: Vec<String>,
    total_marker: String,
    tokens: TokenPattern,
    fallback: SourceFallback,
}

impl GoalsLayout {
    pub fn from_config(config: &GoalsConfig) -> Result<Self, ExtractError> {
        if config.sources.is_empty() {
            return Err(ExtractError::InvalidBinding(
                "goals layout needs at least one source keyword".to_string(),
            ));
        }
        let source_alternation = config
            .sources
            .iter()
            .map(|s| regex::escape(s))
            .collect::<Vec<_>>()
            .join("|");
        let markers = MarkerSet::new()
            .with(MarkerKind::SectionStart, MarkerMatcher::exact(config.goals.clone()))
            .with(
                MarkerKind::TypeTag,
                MarkerMatcher::pattern(&format!("({})", source_alternation))?,
            );

        Ok(Self {
            markers,
            phrases: config.phrases.clone(),
            total_marker: config.total_marker.clone(),
            tokens: config.tokens.compile()?,
            fallback: config.source_fallback,
        })
    }

    /// Leftmost source keyword in `line`, as the marker listing reports it.
    fn classify<'a>(&self, line: &'a str) -> Result<Option<&'a str>, ExtractError> {
        Ok(self.markers.matcher(MarkerKind::TypeTag)?.find(line))
    }

    pub fn extract(
        &self,
        lines: &LineSequence,
        ctx: &StatementContext,
    ) -> Result<Vec<GoalBalanceRow>, ExtractError> {
        let goal_lines = self
            .markers
            .locate(lines, MarkerKind::SectionStart, 0..lines.len())?;
        tracing::debug!("Found {} goal blocks", goal_lines.len());

        let mut balances: BTreeMap<(String, String), [Decimal; BALANCE_FIELDS]> = BTreeMap::new();

        for start in goal_lines {
            let goal = lines.get(start)?.trim().to_string();
            // A goal printed again replaces its earlier rows.
            balances.retain(|(g, _), _| g != &goal);

            let mut source: Option<String> = None;
            let mut index = start + 1;
            loop {
                let line = lines.get(index)?;
                let keyword = self.classify(line)?;
                if keyword.is_none() && line.contains(self.total_marker.as_str()) {
                    break;
                }

                let values = self.tokens.parse_line(line);
                if values.is_empty() {
                    break;
                }

                let row_source = match (keyword, &source, self.fallback) {
                    (Some(k), _, _) => k.to_string(),
                    (None, Some(previous), SourceFallback::CarryOver) => previous.clone(),
                    _ => {
                        return Err(ExtractError::MissingField {
                            field: "source",
                            line: index,
                        })
                    }
                };

                if values.len() < BALANCE_FIELDS {
                    return Err(ExtractError::FieldCount {
                        expected: BALANCE_FIELDS,
                        found: values.len(),
                        line: index,
                    });
                }
                let mut trailing = [Decimal::ZERO; BALANCE_FIELDS];
                trailing.copy_from_slice(&values[values.len() - BALANCE_FIELDS..]);

                balances.insert((goal.clone(), row_source.clone()), trailing);
                source = Some(row_source);
                index += 1;
            }
        }

        let rows: Vec<GoalBalanceRow> = balances
            .into_iter()
            .map(|((goal, source), v)| GoalBalanceRow {
                report_month: ctx.report_month(),
                create_date: ctx.reporting_date,
                goal,
                source,
                start_balance: v[0],
                investment: v[1],
                redemption: v[2],
                gains_losses: v[3],
                end_balance: v[4],
            })
            .filter(|row| !row.is_all_zero())
            .collect();

        let rows = finalize(rows, ctx, &[]);
        flag_if_empty(Layout::Goals, ctx, rows.len());
        Ok(rows)
    }
}

impl TextLayout for GoalsLayout {
    fn layout(&self) -> Layout {
        Layout::Goals
    }

    fn markers(&self) -> &MarkerSet {
        &self.markers
    }

    fn line_sequence(&self, pages: &[String]) -> LineSequence {
        build_line_sequence(pages, &self.phrases)
    }

    fn extract_tables(
        &self,
        lines: &LineSequence,
        ctx: &StatementContext,
    ) -> Result<StatementTables, ExtractError> {
        tracing::info!("Parsing goals statement {} ({} lines)", ctx.source_file, lines.len());
        Ok(StatementTables::Goals(self.extract(lines, ctx)?))
    }
}

/// Goal balances of one statement.
pub fn extract(
    pages: &[String],
    config: &GoalsConfig,
    ctx: &StatementContext,
) -> Result<StatementTables, ExtractError> {
    let layout = GoalsLayout::from_config(config)?;
    let lines = layout.line_sequence(pages);
    layout.extract_tables(&lines, ctx)
}
