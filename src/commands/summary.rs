//! `expense summary` and `expense breakdown`: read every row and total it.

use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::model::{
    aggregate, breakdown as group, type_shares, GroupBy, GroupTotals, Period, PeriodTotals,
    RowIssue, Totals, Transactions, TypeShares,
};
use crate::report::{self, Format, GroupRow, PeriodRow};
use crate::{Result, Session};
use serde::Serialize;
use tracing::warn;

/// The structured output of `expense summary`.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Summary {
    pub period: Period,
    pub totals: Totals,
    pub balance: rust_decimal::Decimal,
    pub buckets: Vec<PeriodTotals>,
    /// Rows that were left out because they could not be read.
    pub skipped: Vec<RowIssue>,
}

/// The structured output of `expense breakdown`.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Breakdown {
    pub by: GroupBy,
    pub groups: Vec<GroupTotals>,
    pub shares: TypeShares,
    pub skipped: Vec<RowIssue>,
}

async fn read(session: &Session) -> Result<Transactions> {
    let mut ledger = session.ledger().await?;
    let transactions = ledger.transactions().await?;
    if !transactions.issues().is_empty() {
        warn!(
            "{} rows could not be read and are not included in the totals",
            transactions.issues().len()
        );
    }
    Ok(transactions)
}

/// Total income, expense and balance, followed by the totals of each `period`, most recent first.
/// `limit` cuts the table to the most recent buckets but not the headline totals.
pub async fn summary(
    session: &Session,
    period: Period,
    format: Format,
    limit: Option<usize>,
) -> Result<Out<Summary>> {
    let transactions = read(session).await?;
    let totals = Totals::of(transactions.data());
    let mut buckets = aggregate(transactions.data(), period);
    if let Some(limit) = limit {
        buckets.truncate(limit);
    }

    let table = report::render(&buckets, format, PeriodRow::new).pub_result(ErrorType::Unknown)?;
    let display = match format {
        Format::Table => format!("{}\n\n{table}", report::kpis(&totals)),
        Format::Csv | Format::Json => table,
    };

    let summary = Summary {
        period,
        totals,
        balance: totals.net(),
        buckets,
        skipped: transactions.issues().to_vec(),
    };
    let message = format!(
        "Summarized {} transactions by {period}{}",
        transactions.len(),
        skipped_note(&summary.skipped)
    );
    Ok(Out::new(message, summary).with_display(display))
}

/// Totals per distinct value of `by`, followed by the share of income and expense.
pub async fn breakdown(session: &Session, by: GroupBy, format: Format) -> Result<Out<Breakdown>> {
    let transactions = read(session).await?;
    let groups = group(transactions.data(), by);
    let shares = type_shares(transactions.data());

    let table = report::render(&groups, format, GroupRow::new).pub_result(ErrorType::Unknown)?;
    let display = match format {
        Format::Table if !groups.is_empty() => format!("{table}\n\n{}", report::shares(&shares)),
        _ => table,
    };

    let breakdown = Breakdown {
        by,
        groups,
        shares,
        skipped: transactions.issues().to_vec(),
    };
    let message = format!(
        "{} groups by {by}{}",
        breakdown.groups.len(),
        skipped_note(&breakdown.skipped)
    );
    Ok(Out::new(message, breakdown).with_display(display))
}

fn skipped_note(skipped: &[RowIssue]) -> String {
    if skipped.is_empty() {
        return String::new();
    }
    let rows: Vec<String> = skipped.iter().map(|i| i.row.to_string()).collect();
    format!(", skipped rows {}", rows.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NONE_KEY;
    use crate::report::EMPTY_PLACEHOLDER;
    use crate::test::TestEnv;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[tokio::test]
    async fn test_summary_by_day() {
        let env = TestEnv::new().await;
        env.set_rows(Some(rows(&[
            &["Date", "Time", "Type", "Category", "Amount", "Note"],
            &["2025-03-10", "08:15:00", "income", "Salary", "500", ""],
            &["2025-03-10", "12:00:00", "expense", "Food", "120", "lunch"],
        ])));
        let out = summary(&env.session().await, Period::Day, Format::Table, None)
            .await
            .unwrap();
        let s = out.structure().unwrap();
        assert_eq!(s.buckets.len(), 1);
        assert_eq!(s.buckets[0].bucket, "2025-03-10");
        assert_eq!(s.buckets[0].income, dec("500"));
        assert_eq!(s.buckets[0].expense, dec("120"));
        assert_eq!(s.buckets[0].net, dec("380"));
        assert_eq!(s.balance, dec("380"));
        assert!(out.display().unwrap().starts_with("Income:"));
    }

    #[tokio::test]
    async fn test_summary_reports_skipped_rows() {
        let env = TestEnv::new().await;
        env.set_rows(Some(rows(&[
            &["Date", "Time", "Type", "Category", "Amount", "Note"],
            &["2025-01-31", "", "expense", "Food", "10", ""],
            &["yesterday", "", "expense", "Food", "99", ""],
            &["2025-02-01", "", "income", "Salary", "1,000.00", ""],
        ])));
        let out = summary(&env.session().await, Period::Month, Format::Json, None)
            .await
            .unwrap();
        let s = out.structure().unwrap();
        assert_eq!(s.skipped.len(), 1);
        assert_eq!(s.skipped[0].row, 3);
        assert!(out.message().contains("skipped rows 3"));

        let labels: Vec<&str> = s.buckets.iter().map(|b| b.bucket.as_str()).collect();
        assert_eq!(labels, vec!["2025-02", "2025-01"]);
        assert_eq!(s.buckets[0].expense, Decimal::ZERO);
        assert_eq!(s.buckets[1].income, Decimal::ZERO);
        assert_eq!(s.totals.income + s.totals.expense, dec("1010"));
        assert!(out.display().unwrap().starts_with('['));
    }

    #[tokio::test]
    async fn test_summary_limit_keeps_totals() {
        let env = TestEnv::new().await;
        let out = summary(&env.session().await, Period::Month, Format::Csv, Some(1))
            .await
            .unwrap();
        let s = out.structure().unwrap();
        assert_eq!(s.buckets.len(), 1);
        assert_eq!(s.buckets[0].bucket, "2025-10");
        assert_eq!(s.totals.income, dec("30312.75"));
    }

    #[tokio::test]
    async fn test_summary_empty_sheet() {
        let env = TestEnv::new().await;
        env.set_rows(Some(Vec::new()));
        let out = summary(&env.session().await, Period::Week, Format::Table, None)
            .await
            .unwrap();
        assert!(out.structure().unwrap().buckets.is_empty());
        assert!(out.display().unwrap().ends_with(EMPTY_PLACEHOLDER));
    }

    #[tokio::test]
    async fn test_breakdown_by_channel() {
        let env = TestEnv::new().await;
        env.set_rows(Some(rows(&[
            &[
                "Date",
                "Time",
                "Type",
                "Account",
                "Source",
                "Destination",
                "Channel",
                "Amount",
                "Note",
            ],
            &["2025-03-10", "", "expense", "Food", "", "", "Cash", "30", ""],
            &["2025-03-11", "", "expense", "Food", "", "", "", "20", ""],
            &["2025-03-11", "", "income", "Pay", "", "", "Bank app", "150", ""],
        ])));
        let out = breakdown(&env.session().await, GroupBy::Channel, Format::Table)
            .await
            .unwrap();
        let b = out.structure().unwrap();
        let keys: Vec<&str> = b.groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["Bank app", "Cash", NONE_KEY]);
        assert_eq!(b.shares.income, dec("75"));
        assert_eq!(b.shares.expense, dec("25"));
        assert!(out.display().unwrap().contains("Income 75"));
    }
}
