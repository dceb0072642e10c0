//! Renders aggregation results for the terminal as Markdown tables, CSV or JSON.

use crate::error::Res;
use crate::model::{
    format_decimal, Column, GroupTotals, PeriodTotals, Totals, Transaction, TypeLabels, TypeShares,
};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tabled::settings::object::Columns;
use tabled::settings::{Alignment, Modify, Style};
use tabled::{Table, Tabled};

/// What is printed in place of a table when there is nothing to show.
pub const EMPTY_PLACEHOLDER: &str = "No transactions yet.";

/// The output format of a report.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    Eq,
    PartialEq,
    Hash,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Markdown table.
    #[default]
    Table,
    /// CSV with a header row.
    Csv,
    /// Pretty-printed JSON array.
    Json,
}

serde_plain::derive_display_from_serialize!(Format);
serde_plain::derive_fromstr_from_deserialize!(Format);

/// One line of a report table. `Tabled` names and orders the columns; `Serialize` writes the
/// same cells as CSV.
pub(crate) trait DisplayRow: Tabled + Serialize {
    /// Columns holding amounts, which are right-aligned.
    const AMOUNTS: Range<usize>;
}

#[derive(Debug, Clone, Tabled, Serialize)]
pub(crate) struct PeriodRow {
    #[tabled(rename = "Period")]
    period: String,
    #[tabled(rename = "Income")]
    income: String,
    #[tabled(rename = "Expense")]
    expense: String,
    #[tabled(rename = "Net")]
    net: String,
}

impl PeriodRow {
    pub(crate) fn new(totals: &PeriodTotals) -> Self {
        Self {
            period: totals.bucket.clone(),
            income: format_decimal(totals.income),
            expense: format_decimal(totals.expense),
            net: format_decimal(totals.net),
        }
    }
}

impl DisplayRow for PeriodRow {
    const AMOUNTS: Range<usize> = 1..4;
}

#[derive(Debug, Clone, Tabled, Serialize)]
pub(crate) struct GroupRow {
    #[tabled(rename = "Group")]
    group: String,
    #[tabled(rename = "Income")]
    income: String,
    #[tabled(rename = "Expense")]
    expense: String,
    #[tabled(rename = "Net")]
    net: String,
}

impl GroupRow {
    pub(crate) fn new(totals: &GroupTotals) -> Self {
        Self {
            group: totals.key.clone(),
            income: format_decimal(totals.income),
            expense: format_decimal(totals.expense),
            net: format_decimal(totals.net),
        }
    }
}

impl DisplayRow for GroupRow {
    const AMOUNTS: Range<usize> = 1..4;
}

#[derive(Debug, Clone, Tabled, Serialize)]
pub(crate) struct TransactionRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Account")]
    account: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Destination")]
    destination: String,
    #[tabled(rename = "Channel")]
    channel: String,
    #[tabled(rename = "Amount")]
    amount: String,
    #[tabled(rename = "Note")]
    note: String,
}

impl TransactionRow {
    /// The Type column shows the same label that is written to the sheet.
    pub(crate) fn new(transaction: &Transaction, labels: &TypeLabels) -> Self {
        Self {
            date: transaction.text(Column::Date),
            time: transaction.text(Column::Time),
            kind: labels.label(transaction.kind()).to_string(),
            account: transaction.account().to_string(),
            source: transaction.source().to_string(),
            destination: transaction.destination().to_string(),
            channel: transaction.channel().to_string(),
            amount: format_decimal(transaction.amount().value()),
            note: transaction.note().to_string(),
        }
    }
}

impl DisplayRow for TransactionRow {
    const AMOUNTS: Range<usize> = 7..8;
}

/// Renders `records` in the given `format`, turning each into a table line with `row`. JSON is
/// written from the records themselves so it keeps exact values. An empty table renders as a
/// placeholder line, an empty CSV as its header row and empty JSON as `[]`.
pub(crate) fn render<T, R>(records: &[T], format: Format, row: impl Fn(&T) -> R) -> Res<String>
where
    T: Serialize,
    R: DisplayRow,
{
    match format {
        Format::Table => Ok(table(records.iter().map(row).collect())),
        Format::Csv => csv(records.iter().map(row)),
        Format::Json => {
            serde_json::to_string_pretty(records).context("Unable to serialize as JSON")
        }
    }
}

fn table<R: DisplayRow>(rows: Vec<R>) -> String {
    if rows.is_empty() {
        return EMPTY_PLACEHOLDER.to_string();
    }
    Table::new(rows)
        .with(Style::markdown())
        .with(Modify::new(Columns::new(R::AMOUNTS)).with(Alignment::right()))
        .to_string()
}

fn csv<R: DisplayRow>(rows: impl Iterator<Item = R>) -> Res<String> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    wtr.write_record(R::headers().iter().map(|h| h.as_bytes()))
        .context("Unable to write CSV header")?;
    for row in rows {
        wtr.serialize(row).context("Unable to write CSV record")?;
    }
    let bytes = wtr.into_inner().context("Unable to flush CSV output")?;
    String::from_utf8(bytes).context("CSV output was not UTF-8")
}

/// The three headline numbers: total income, total expense and the balance between them.
pub(crate) fn kpis(totals: &Totals) -> String {
    let values = [
        ("Income", format_decimal(totals.income)),
        ("Expense", format_decimal(totals.expense)),
        ("Balance", format_decimal(totals.net())),
    ];
    let width = values.iter().map(|(_, v)| v.len()).max().unwrap_or(0);
    values
        .iter()
        .map(|(name, value)| format!("{:<8} {value:>width$}", format!("{name}:")))
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn shares(shares: &TypeShares) -> String {
    format!(
        "Income {}% / Expense {}%",
        shares.income.round_dp(2),
        shares.expense.round_dp(2)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Amount, TransactionType};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn periods() -> Vec<PeriodTotals> {
        vec![
            PeriodTotals {
                bucket: String::from("2025-03"),
                start: chrono::NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
                income: dec("500"),
                expense: dec("1120.5"),
                net: dec("-620.5"),
            },
            PeriodTotals {
                bucket: String::from("2025-02"),
                start: chrono::NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
                income: dec("0"),
                expense: dec("3"),
                net: dec("-3"),
            },
        ]
    }

    fn render_periods(format: Format) -> String {
        render(&periods(), format, PeriodRow::new).unwrap()
    }

    #[test]
    fn test_markdown_table() {
        let table = render_periods(Format::Table);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("| Period"));
        assert!(lines[1].starts_with("|-"));
        assert!(lines[2].starts_with("| 2025-03 "));
        assert!(lines[2].contains("| 1,120.50 |"));
        // Amounts are right-aligned under the widest value of their column.
        assert!(lines[3].contains("|     3.00 |"));
        assert!(lines[3].contains("|   0.00 |"));
    }

    #[test]
    fn test_empty_table_is_placeholder() {
        let empty: Vec<PeriodTotals> = Vec::new();
        let render_empty = |format| render(&empty, format, PeriodRow::new).unwrap();
        assert_eq!(render_empty(Format::Table), EMPTY_PLACEHOLDER);
        assert_eq!(render_empty(Format::Json), "[]");
        assert_eq!(render_empty(Format::Csv), "Period,Income,Expense,Net\n");
    }

    #[test]
    fn test_csv_quotes_separators() {
        let csv = render_periods(Format::Csv);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Period,Income,Expense,Net");
        assert_eq!(lines[1], "2025-03,500.00,\"1,120.50\",-620.50");
    }

    #[test]
    fn test_json_keeps_exact_values() {
        let json = render_periods(Format::Json);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["bucket"], "2025-03");
        assert_eq!(value[0]["net"], "-620.5");
    }

    #[test]
    fn test_transaction_type_uses_labels() {
        let transaction = Transaction::new(
            chrono::NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            TransactionType::Expense,
            Amount::from_str("42").unwrap(),
        );
        let labels = TypeLabels::new("รายจ่าย", "รายรับ");
        let rows = vec![transaction];

        let table = render(&rows, Format::Table, |t| TransactionRow::new(t, &labels)).unwrap();
        assert!(table.starts_with("| Date"));
        assert!(table.contains("| รายจ่าย |"));
        assert!(!table.contains("expense"));

        let csv = render(&rows, Format::Csv, |t| TransactionRow::new(t, &labels)).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "Date,Time,Type,Account,Source,Destination,Channel,Amount,Note"
        );
        assert_eq!(lines[1], "2025-03-10,,รายจ่าย,,,,,42.00,");
    }

    #[test]
    fn test_kpis() {
        let totals = Totals {
            income: dec("1000"),
            expense: dec("120"),
        };
        assert_eq!(
            kpis(&totals),
            "Income:  1,000.00\nExpense:   120.00\nBalance:   880.00"
        );
    }
}
