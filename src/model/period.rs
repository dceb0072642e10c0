//! Period aggregation: totals of income, expense and net balance per day, week, month or year.

use crate::model::{Transaction, TransactionType};
use chrono::{Datelike, Days, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// The calendar unit that transactions are bucketed by.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Day,
    Week,
    #[default]
    Month,
    Year,
}

serde_plain::derive_display_from_serialize!(Period);
serde_plain::derive_fromstr_from_deserialize!(Period);

impl Period {
    /// The bucket that `date` falls into. This is defined for every valid date.
    pub fn bucket(&self, date: NaiveDate) -> Bucket {
        let start = match self {
            Period::Day => date,
            Period::Week => date
                .checked_sub_days(Days::new(u64::from(date.weekday().num_days_from_monday())))
                .unwrap_or(date),
            Period::Month => date.with_day(1).unwrap_or(date),
            Period::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date),
        };
        Bucket {
            period: *self,
            start,
        }
    }
}

/// A time bucket, identified by its period and the first day it covers. Buckets order
/// chronologically by that first day, never by their label.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct Bucket {
    period: Period,
    start: NaiveDate,
}

impl Bucket {
    pub fn period(&self) -> Period {
        self.period
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// `2025-03-10`, `2025-W05`, `2025-03` or `2025`. Weeks use the ISO week-numbering year, so
    /// Monday 2024-12-30 is labelled `2025-W01`.
    pub fn label(&self) -> String {
        match self.period {
            Period::Day => self.start.format("%Y-%m-%d").to_string(),
            Period::Week => {
                let week = self.start.iso_week();
                format!("{}-W{:02}", week.year(), week.week())
            }
            Period::Month => self.start.format("%Y-%m").to_string(),
            Period::Year => self.start.format("%Y").to_string(),
        }
    }
}

impl Display for Bucket {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

impl Ord for Bucket {
    fn cmp(&self, other: &Self) -> Ordering {
        self.start
            .cmp(&other.start)
            .then_with(|| self.period.cmp(&other.period))
    }
}

impl PartialOrd for Bucket {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Income and expense sums. Net is always derived, so it cannot drift from the two sums.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub income: Decimal,
    pub expense: Decimal,
}

impl Totals {
    /// The totals over every transaction in `transactions`.
    pub fn of<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> Self {
        let mut totals = Totals::default();
        for t in transactions {
            totals.add(t);
        }
        totals
    }

    pub fn add(&mut self, transaction: &Transaction) {
        let value = transaction.amount().value();
        match transaction.kind() {
            TransactionType::Income => self.income += value,
            TransactionType::Expense => self.expense += value,
        }
    }

    /// Income minus expense.
    pub fn net(&self) -> Decimal {
        self.income - self.expense
    }

    /// Income plus expense, i.e. the total volume of money moved.
    pub fn volume(&self) -> Decimal {
        self.income + self.expense
    }
}

/// One row of a period summary.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct PeriodTotals {
    pub bucket: String,
    pub start: NaiveDate,
    pub income: Decimal,
    pub expense: Decimal,
    pub net: Decimal,
}

impl PeriodTotals {
    fn new(bucket: Bucket, totals: Totals) -> Self {
        Self {
            bucket: bucket.label(),
            start: bucket.start(),
            income: totals.income,
            expense: totals.expense,
            net: totals.net(),
        }
    }
}

/// Groups `transactions` into buckets of `period` and sums income and expense in each. Every
/// bucket that has at least one transaction is present, with a zero total for a type that has no
/// transactions in it. Buckets are ordered most recent first.
pub fn aggregate<'a>(
    transactions: impl IntoIterator<Item = &'a Transaction>,
    period: Period,
) -> Vec<PeriodTotals> {
    let mut buckets: BTreeMap<Bucket, Totals> = BTreeMap::new();
    for transaction in transactions {
        buckets
            .entry(period.bucket(transaction.date()))
            .or_default()
            .add(transaction);
    }
    buckets
        .into_iter()
        .rev()
        .map(|(bucket, totals)| PeriodTotals::new(bucket, totals))
        .collect()
}
