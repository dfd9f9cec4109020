// src/layouts/insurance.rs
//! Insurance wrapper with an initial units account (IUA) and an accumulation
//! units account (AUA).
//!
//! Each account title may appear zero, one or more times. A title whose
//! funds are printed as bare headers, with or without opening/closing
//! balance blocks, starts a detail section; otherwise it starts a summary
//! section listing one line per fund with its figures. Summary lines for the
//! same fund across occurrences are merged.

use super::{finalize, flag_if_empty, Layout, StatementTables, TextLayout};
use crate::config::InsuranceConfig;
use crate::extractors::markers::{LineSequence, MarkerKind, MarkerMatcher, MarkerSet};
use crate::extractors::records::{RecordBlockExtractor, TransactionField};
use crate::extractors::section::{aggregate_summaries, SectionExtractor};
use crate::extractors::tokens::TokenPattern;
use crate::models::{AccountBucket, StatementContext, SummaryRecord, TransactionRecord};
use crate::source::join_pages;
use crate::utils::error::ExtractError;
use regex::Regex;
use std::ops::Range;

/// One occurrence of an account title and the lines it governs.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SectionOccurrence {
    bucket: AccountBucket,
    range: Range<usize>,
}

pub struct InsuranceLayout {
    markers: MarkerSet,
    phrases: Vec<String>,
    initial_titles: Vec<String>,
    accumulation_titles: Vec<String>,
    policy_number: Regex,
    statement_date: Option<Regex>,
    split_header: Option<Regex>,
    tokens: TokenPattern,
    columns: Vec<TransactionField>,
}

impl InsuranceLayout {
    pub fn from_config(config: &InsuranceConfig) -> Result<Self, ExtractError> {
        let titles = config
            .initial_units_titles
            .iter()
            .chain(config.accumulation_units_titles.iter())
            .cloned();
        let markers = MarkerSet::new()
            .with(MarkerKind::SectionStart, MarkerMatcher::exact(titles))
            .with(MarkerKind::FundHeader, MarkerMatcher::pattern(&config.fund_header)?)
            .with(MarkerKind::OpenBalance, MarkerMatcher::pattern(&config.open_balance)?)
            .with(MarkerKind::CloseBalance, MarkerMatcher::pattern(&config.close_balance)?);

        let split_header = if config.split_header_currencies.is_empty() {
            None
        } else {
            let currencies = config
                .split_header_currencies
                .iter()
                .map(|c| regex::escape(c))
                .collect::<Vec<_>>()
                .join("|");
            Some(compile(&format!(r"\b({})\r?\n(Acc)\b", currencies))?)
        };

        Ok(Self {
            markers,
            phrases: config.phrases.clone(),
            initial_titles: config.initial_units_titles.clone(),
            accumulation_titles: config.accumulation_units_titles.clone(),
            policy_number: compile(&config.policy_number)?,
            statement_date: config.statement_date.as_deref().map(compile).transpose()?,
            split_header,
            tokens: config.tokens.compile()?,
            columns: config.transaction_columns.clone(),
        })
    }

    /// Rejoins fund headers whose currency and account word were split
    /// across two lines ("... SGD\nAcc 1,000.00 ...").
    pub fn repair_split_headers(&self, text: &str) -> String {
        match &self.split_header {
            Some(re) => re.replace_all(text, "$1 $2").into_owned(),
            None => text.to_string(),
        }
    }

    /// The policy identifier printed once on the statement.
    pub fn policy_number(&self, lines: &LineSequence) -> Result<String, ExtractError> {
        lines
            .iter()
            .find_map(|line| self.policy_number.captures(line))
            .and_then(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
            .ok_or_else(|| ExtractError::MarkerNotFound("policy number".to_string()))
    }

    fn bucket_of(&self, title: &str) -> Option<AccountBucket> {
        let title = title.trim();
        if self.initial_titles.iter().any(|t| t == title) {
            Some(AccountBucket::InitialUnits)
        } else if self.accumulation_titles.iter().any(|t| t == title) {
            Some(AccountBucket::AccumulationUnits)
        } else {
            None
        }
    }

    /// Every account title occurrence; each runs until the next title of
    /// either account or the end of the statement.
    fn occurrences(&self, lines: &LineSequence) -> Result<Vec<SectionOccurrence>, ExtractError> {
        let starts = self
            .markers
            .locate(lines, MarkerKind::SectionStart, 0..lines.len())?;

        let mut occurrences = Vec::with_capacity(starts.len());
        for (i, &start) in starts.iter().enumerate() {
            let end = starts.get(i + 1).copied().unwrap_or(lines.len());
            let bucket = self.bucket_of(lines.get(start)?).ok_or_else(|| {
                ExtractError::MarkerNotFound(format!("account for section title at line {}", start))
            })?;
            occurrences.push(SectionOccurrence {
                bucket,
                range: start..end,
            });
        }
        Ok(occurrences)
    }

    /// A detail section either holds an opening balance or lists its funds
    /// as bare headers; summary fund lines always carry figures.
    fn is_detail(&self, lines: &LineSequence, range: &Range<usize>) -> Result<bool, ExtractError> {
        let opens = self
            .markers
            .locate(lines, MarkerKind::OpenBalance, range.clone())?;
        if !opens.is_empty() {
            return Ok(true);
        }

        let headers = self
            .markers
            .locate(lines, MarkerKind::FundHeader, (range.start + 1)..range.end)?;
        match headers.first() {
            Some(&first) => Ok(self.tokens.parse_line(lines.get(first)?).is_empty()),
            None => Ok(false),
        }
    }

    fn extract_detail(
        &self,
        lines: &LineSequence,
        occurrence: &SectionOccurrence,
    ) -> Result<Vec<TransactionRecord>, ExtractError> {
        let range = &occurrence.range;
        let mut fund_starts = self
            .markers
            .locate(lines, MarkerKind::FundHeader, (range.start + 1)..range.end)?;
        if fund_starts.is_empty() {
            return Err(ExtractError::EmptySection(format!(
                "{} detail at line {}",
                occurrence.bucket, range.start
            )));
        }
        fund_starts.push(range.end);

        let extractor = RecordBlockExtractor::new(&self.markers, &self.tokens, &self.columns)?;
        extractor.extract_transactions(lines, &fund_starts, occurrence.bucket)
    }

    pub fn extract(
        &self,
        lines: &LineSequence,
        ctx: &StatementContext,
    ) -> Result<(Vec<SummaryRecord>, Vec<TransactionRecord>), ExtractError> {
        let policy = self.policy_number(lines)?;
        let ctx = ctx.clone().with_account_id(policy);
        let section = SectionExtractor::new(&self.markers, &self.tokens);

        let mut summary = Vec::new();
        let mut transactions = Vec::new();

        for occurrence in self.occurrences(lines)? {
            if self.is_detail(lines, &occurrence.range)? {
                tracing::debug!("{} detail section at lines {:?}", occurrence.bucket, occurrence.range);
                transactions.extend(self.extract_detail(lines, &occurrence)?);
                continue;
            }

            tracing::debug!("{} summary section at lines {:?}", occurrence.bucket, occurrence.range);
            let rows = section.extract_summary(lines, occurrence.range.clone(), ctx.reporting_date)?;
            if rows.is_empty() {
                return Err(ExtractError::EmptySection(format!(
                    "{} summary at line {}",
                    occurrence.bucket, occurrence.range.start
                )));
            }
            summary.extend(rows.into_iter().map(|mut row| {
                row.account_type = Some(occurrence.bucket);
                row
            }));
        }

        let summary = finalize(aggregate_summaries(summary), &ctx, &[]);
        let transactions = finalize(transactions, &ctx, &[]);
        flag_if_empty(Layout::Insurance, &ctx, summary.len() + transactions.len());
        Ok((summary, transactions))
    }
}

impl TextLayout for InsuranceLayout {
    fn layout(&self) -> Layout {
        Layout::Insurance
    }

    fn markers(&self) -> &MarkerSet {
        &self.markers
    }

    fn line_sequence(&self, pages: &[String]) -> LineSequence {
        let joined = join_pages(pages, &self.phrases);
        LineSequence::from_text(&self.repair_split_headers(&joined))
    }

    fn statement_date_pattern(&self) -> Option<&Regex> {
        self.statement_date.as_ref()
    }

    fn extract_tables(
        &self,
        lines: &LineSequence,
        ctx: &StatementContext,
    ) -> Result<StatementTables, ExtractError> {
        tracing::info!("Parsing insurance statement {} ({} lines)", ctx.source_file, lines.len());
        let (summary, transactions) = self.extract(lines, ctx)?;
        Ok(StatementTables::Insurance {
            summary,
            transactions,
        })
    }
}

/// Fund summaries and fund transactions of one statement.
pub fn extract(
    pages: &[String],
    config: &InsuranceConfig,
    ctx: &StatementContext,
) -> Result<StatementTables, ExtractError> {
    let layout = InsuranceLayout::from_config(config)?;
    let lines = layout.line_sequence(pages);
    layout.extract_tables(&lines, ctx)
}

fn compile(pattern: &str) -> Result<Regex, ExtractError> {
    Regex::new(pattern).map_err(|e| ExtractError::RegexError(format!("'{}': {}", pattern, e)))
}
