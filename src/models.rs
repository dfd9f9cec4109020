// src/models.rs
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Facts about one statement that every emitted row carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementContext {
    pub reporting_date: NaiveDate,
    pub account_id: Option<String>,
    pub source_file: String,
}

impl StatementContext {
    pub fn new(reporting_date: NaiveDate, source_file: impl Into<String>) -> Self {
        Self {
            reporting_date,
            account_id: None,
            source_file: source_file.into(),
        }
    }

    pub fn with_account_id(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    /// `YYYY-MM` of the reporting date.
    pub fn report_month(&self) -> String {
        report_month(self.reporting_date)
    }
}

pub fn report_month(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

/// Sub-ledger of an insurance policy that owns a set of fund rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AccountBucket {
    /// Initial units account.
    #[serde(rename = "IUA")]
    InitialUnits,
    /// Accumulation units account.
    #[serde(rename = "AUA")]
    AccumulationUnits,
}

impl fmt::Display for AccountBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountBucket::InitialUnits => f.write_str("IUA"),
            AccountBucket::AccumulationUnits => f.write_str("AUA"),
        }
    }
}

/// One fund's holding in one summary section occurrence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRecord {
    pub report_month: String,
    pub as_of_date: NaiveDate,
    pub account_type: Option<AccountBucket>,
    pub policy_number: Option<String>,
    pub fund_name: String,
    pub units: Decimal,
    pub unit_price_fund_currency: Decimal,
    pub value_fund_currency: Decimal,
    pub value_reporting_currency: Decimal,
}

/// One dated movement of units inside a fund's opening/closing block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRecord {
    pub report_month: String,
    pub transaction_date: NaiveDate,
    pub account_type: AccountBucket,
    pub policy_number: Option<String>,
    pub fund_name: String,
    pub transaction_type: String,
    pub units: Decimal,
    pub unit_price_fund_currency: Decimal,
    pub value_fund_currency: Decimal,
    pub value_reporting_currency: Decimal,
    pub fx_rate: Option<Decimal>,
}

/// Balances and flows of one (goal, source) pair on the goals platform.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalBalanceRow {
    pub report_month: String,
    pub create_date: NaiveDate,
    pub goal: String,
    pub source: String,
    pub start_balance: Decimal,
    pub investment: Decimal,
    pub redemption: Decimal,
    pub gains_losses: Decimal,
    pub end_balance: Decimal,
}

impl GoalBalanceRow {
    pub fn is_all_zero(&self) -> bool {
        [
            self.start_balance,
            self.investment,
            self.redemption,
            self.gains_losses,
            self.end_balance,
        ]
        .iter()
        .all(Decimal::is_zero)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeDirection {
    Bought,
    Sold,
}

impl TradeDirection {
    /// Direction implied by a signed quantity.
    pub fn from_units(units: Decimal) -> Self {
        if units > Decimal::ZERO {
            TradeDirection::Bought
        } else {
            TradeDirection::Sold
        }
    }
}

/// A single stock trade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRow {
    pub report_date: Option<NaiveDate>,
    pub holdings: String,
    pub units: Decimal,
    pub unit_price_usd: Decimal,
    pub create_date: NaiveDate,
    pub transaction_type: TradeDirection,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_report_month() {
        let ctx = StatementContext::new(NaiveDate::from_ymd_opt(2024, 10, 31).unwrap(), "a.pdf");
        assert_eq!(ctx.report_month(), "2024-10");
    }

    #[test]
    fn test_direction_from_sign() {
        assert_eq!(TradeDirection::from_units(dec!(10)), TradeDirection::Bought);
        assert_eq!(TradeDirection::from_units(dec!(-5)), TradeDirection::Sold);
    }

    #[test]
    fn test_bucket_serializes_as_short_label() {
        let json = serde_json::to_string(&AccountBucket::AccumulationUnits).unwrap();
        assert_eq!(json, "\"AUA\"");
    }
}
