//! Totals grouped by a categorical field of the transaction, and the income/expense split.

use crate::model::period::Totals;
use crate::model::Transaction;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The key shown for transactions that have nothing in the grouped field.
pub const NONE_KEY: &str = "(none)";

/// The field that `breakdown` groups by.
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
pub enum GroupBy {
    #[default]
    Account,
    Channel,
    Source,
    Destination,
}

serde_plain::derive_display_from_serialize!(GroupBy);
serde_plain::derive_fromstr_from_deserialize!(GroupBy);

impl GroupBy {
    fn key<'a>(&self, transaction: &'a Transaction) -> &'a str {
        let value = match self {
            GroupBy::Account => transaction.account(),
            GroupBy::Channel => transaction.channel(),
            GroupBy::Source => transaction.source(),
            GroupBy::Destination => transaction.destination(),
        };
        let value = value.trim();
        if value.is_empty() {
            NONE_KEY
        } else {
            value
        }
    }
}

/// One row of a breakdown.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct GroupTotals {
    pub key: String,
    pub income: Decimal,
    pub expense: Decimal,
    pub net: Decimal,
}

/// Sums income and expense per distinct value of the `group_by` field. Groups are ordered by the
/// money they moved (income plus expense), largest first, with ties broken by key.
pub fn breakdown<'a>(
    transactions: impl IntoIterator<Item = &'a Transaction>,
    group_by: GroupBy,
) -> Vec<GroupTotals> {
    let mut groups: BTreeMap<&str, Totals> = BTreeMap::new();
    for transaction in transactions {
        groups
            .entry(group_by.key(transaction))
            .or_default()
            .add(transaction);
    }

    let mut rows: Vec<(&str, Totals)> = groups.into_iter().collect();
    rows.sort_by(|(a_key, a), (b_key, b)| b.volume().cmp(&a.volume()).then(a_key.cmp(b_key)));
    rows.into_iter()
        .map(|(key, totals)| GroupTotals {
            key: key.to_string(),
            income: totals.income,
            expense: totals.expense,
            net: totals.net(),
        })
        .collect()
}

/// The percentage of all money moved that was income, and that was expense.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct TypeShares {
    pub income: Decimal,
    pub expense: Decimal,
}

/// Shares are rounded to two decimal places. Both are zero when nothing has been recorded.
pub fn type_shares<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> TypeShares {
    let totals = Totals::of(transactions);
    let volume = totals.volume();
    if volume.is_zero() {
        return TypeShares::default();
    }
    let hundred = Decimal::ONE_HUNDRED;
    TypeShares {
        income: (totals.income * hundred / volume).round_dp(2),
        expense: (totals.expense * hundred / volume).round_dp(2),
    }
}
