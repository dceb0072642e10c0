use crate::model::schema::{Column, Layout};
use crate::model::Amount;
use crate::Result;
use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

/// The format in which dates are written to the sheet.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// The format in which times are written to the sheet.
const TIME_FORMAT: &str = "%H:%M:%S";

/// Formats accepted when reading dates back. Rows typed in by hand may use the latter two.
const DATE_FORMATS: &[&str] = &[DATE_FORMAT, "%Y/%m/%d", "%m/%d/%Y"];

const TIME_FORMATS: &[&str] = &[TIME_FORMAT, "%H:%M"];

/// Whether money came in or went out. This is a closed set.
#[derive(
    Debug,
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
pub enum TransactionType {
    Expense,
    Income,
}

serde_plain::derive_display_from_serialize!(TransactionType);
serde_plain::derive_fromstr_from_deserialize!(TransactionType);

/// The literal strings stored in the Type column. Matching is by exact string equality (after
/// trimming surrounding whitespace), so these must agree with whatever is already in the sheet.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct TypeLabels {
    expense: String,
    income: String,
}

impl Default for TypeLabels {
    fn default() -> Self {
        Self {
            expense: String::from("expense"),
            income: String::from("income"),
        }
    }
}

impl TypeLabels {
    pub fn new(expense: impl Into<String>, income: impl Into<String>) -> Self {
        Self {
            expense: expense.into(),
            income: income.into(),
        }
    }

    pub fn label(&self, kind: TransactionType) -> &str {
        match kind {
            TransactionType::Expense => &self.expense,
            TransactionType::Income => &self.income,
        }
    }

    pub fn parse(&self, s: &str) -> Option<TransactionType> {
        let s = s.trim();
        if s == self.expense {
            Some(TransactionType::Expense)
        } else if s == self.income {
            Some(TransactionType::Income)
        } else {
            None
        }
    }

    pub(crate) fn is_ambiguous(&self) -> bool {
        self.expense.trim().is_empty()
            || self.income.trim().is_empty()
            || self.expense.trim() == self.income.trim()
    }
}

/// A value written into a single cell.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Cell {
    Text(String),
    Number(Decimal),
}

impl Cell {
    fn text(s: impl Into<String>) -> Self {
        Cell::Text(s.into())
    }
}

/// Represents a single row of the transactions worksheet.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Transaction {
    pub(crate) date: NaiveDate,
    pub(crate) time: Option<NaiveTime>,
    #[serde(rename = "type")]
    pub(crate) kind: TransactionType,
    pub(crate) account: String,
    pub(crate) source: String,
    pub(crate) destination: String,
    pub(crate) channel: String,
    pub(crate) amount: Amount,
    pub(crate) note: String,
}

impl Transaction {
    /// Creates a transaction with all optional text fields empty.
    pub fn new(date: NaiveDate, kind: TransactionType, amount: Amount) -> Self {
        Self {
            date,
            time: None,
            kind,
            account: String::new(),
            source: String::new(),
            destination: String::new(),
            channel: String::new(),
            amount,
            note: String::new(),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn time(&self) -> Option<NaiveTime> {
        self.time
    }

    pub fn kind(&self) -> TransactionType {
        self.kind
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn note(&self) -> &str {
        &self.note
    }

    /// The value of a text column.
    pub(crate) fn text(&self, column: Column) -> String {
        match column {
            Column::Date => self.date.format(DATE_FORMAT).to_string(),
            Column::Time => self
                .time
                .map(|t| t.format(TIME_FORMAT).to_string())
                .unwrap_or_default(),
            Column::Type => self.kind.to_string(),
            Column::Account => self.account.clone(),
            Column::Source => self.source.clone(),
            Column::Destination => self.destination.clone(),
            Column::Channel => self.channel.clone(),
            Column::Amount => self.amount.to_string(),
            Column::Note => self.note.clone(),
        }
    }

    /// Fields that are not empty but that `layout` has no column for, and which would therefore be
    /// lost when writing.
    pub(crate) fn dropped_by(&self, layout: Layout) -> Vec<Column> {
        [Column::Source, Column::Destination, Column::Channel]
            .into_iter()
            .filter(|c| !layout.has(*c) && !self.text(*c).is_empty())
            .collect()
    }

    /// Serializes the transaction into a row ordered by `layout`.
    pub(crate) fn to_row(&self, layout: Layout, labels: &TypeLabels) -> Vec<Cell> {
        layout
            .columns()
            .iter()
            .map(|column| match column {
                Column::Type => Cell::text(labels.label(self.kind)),
                Column::Amount => Cell::Number(self.amount.value()),
                other => Cell::text(self.text(*other)),
            })
            .collect()
    }

    /// Parses a row that was read from a sheet with the given `layout`. The error is a
    /// human-readable reason the row is unusable.
    fn from_row(
        layout: Layout,
        labels: &TypeLabels,
        cells: &[String],
    ) -> std::result::Result<Self, String> {
        if cells.len() > layout.len() && cells[layout.len()..].iter().any(|c| !c.trim().is_empty())
        {
            return Err(format!(
                "The row has {} cells but the header has {}",
                cells.len(),
                layout.len()
            ));
        }

        let raw_date = cell(layout, cells, Column::Date);
        if raw_date.is_empty() {
            return Err(String::from("The date is empty"));
        }
        let date =
            parse_date(raw_date).ok_or_else(|| format!("Unable to parse the date '{raw_date}'"))?;

        let raw_type = cell(layout, cells, Column::Type);
        let kind = labels
            .parse(raw_type)
            .ok_or_else(|| format!("Unrecognized type '{raw_type}'"))?;

        let raw_amount = cell(layout, cells, Column::Amount);
        if raw_amount.is_empty() {
            return Err(String::from("The amount is empty"));
        }
        let amount = Amount::from_str(raw_amount)
            .map_err(|e| format!("Unable to parse the amount '{raw_amount}': {e}"))?;

        Ok(Self {
            date,
            time: parse_time(cell(layout, cells, Column::Time)),
            kind,
            account: cell(layout, cells, Column::Account).to_string(),
            source: cell(layout, cells, Column::Source).to_string(),
            destination: cell(layout, cells, Column::Destination).to_string(),
            channel: cell(layout, cells, Column::Channel).to_string(),
            amount,
            note: cell(layout, cells, Column::Note).to_string(),
        })
    }
}

/// The trimmed contents of `column`, or an empty string if the layout has no such column or the
/// row is short.
fn cell<'a>(layout: Layout, cells: &'a [String], column: Column) -> &'a str {
    layout
        .columns()
        .iter()
        .position(|c| *c == column)
        .and_then(|ix| cells.get(ix))
        .map(|s| s.trim())
        .unwrap_or("")
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    TIME_FORMATS
        .iter()
        .find_map(|f| NaiveTime::parse_from_str(s, f).ok())
}

/// A row that was excluded while reading the sheet.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct RowIssue {
    /// The 1-based row number in the sheet, counting the header.
    pub row: usize,
    pub reason: String,
}

/// Represents the transactions read from a worksheet, along with the rows that could not be used.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Transactions {
    /// `None` when the worksheet is completely empty.
    layout: Option<Layout>,
    data: Vec<Transaction>,
    issues: Vec<RowIssue>,
}

impl Transactions {
    /// Parses the rows of a worksheet. The first row must be a header row matching one of the
    /// known layouts. Rows that cannot be parsed are excluded and recorded as issues; they do not
    /// cause the whole parse to fail.
    pub fn parse<S, R>(rows: impl IntoIterator<Item = R>, labels: &TypeLabels) -> Result<Self>
    where
        S: AsRef<str>,
        R: IntoIterator<Item = S>,
    {
        let mut rows = rows.into_iter();
        let header: Vec<String> = match rows.next() {
            Some(header_row) => header_row
                .into_iter()
                .map(|s| s.as_ref().to_string())
                .collect(),
            None => return Ok(Self::default()),
        };
        let layout = Layout::detect(&header)?;

        let mut data = Vec::new();
        let mut issues = Vec::new();
        for (ix, row) in rows.enumerate() {
            let cells: Vec<String> = row.into_iter().map(|s| s.as_ref().to_string()).collect();
            if cells.iter().all(|c| c.trim().is_empty()) {
                continue;
            }
            match Transaction::from_row(layout, labels, &cells) {
                Ok(transaction) => data.push(transaction),
                Err(reason) => {
                    // +1 for the header, +1 for 1-based row numbers
                    let row = ix + 2;
                    debug!("Skipping row {row}: {reason}");
                    issues.push(RowIssue { row, reason });
                }
            }
        }

        Ok(Self {
            layout: Some(layout),
            data,
            issues,
        })
    }

    pub fn layout(&self) -> Option<Layout> {
        self.layout
    }

    pub fn data(&self) -> &[Transaction] {
        &self.data
    }

    pub fn issues(&self) -> &[RowIssue] {
        &self.issues
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The last `n` transactions in sheet order, newest first.
    pub fn recent(&self, n: usize) -> Vec<Transaction> {
        self.data.iter().rev().take(n).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn full_header() -> Vec<&'static str> {
        Layout::Full.headers()
    }

    #[test]
    fn test_to_row_full() {
        let mut t = Transaction::new(
            NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            TransactionType::Income,
            Amount::from_str("500").unwrap(),
        );
        t.time = NaiveTime::from_hms_opt(8, 15, 0);
        t.account = String::from("Savings");
        t.channel = String::from("Bank app");
        t.note = String::from("salary");

        let row = t.to_row(Layout::Full, &TypeLabels::default());
        assert_eq!(
            row,
            vec![
                Cell::text("2025-03-10"),
                Cell::text("08:15:00"),
                Cell::text("income"),
                Cell::text("Savings"),
                Cell::text(""),
                Cell::text(""),
                Cell::text("Bank app"),
                Cell::Number(dec("500")),
                Cell::text("salary"),
            ]
        );
    }

    #[test]
    fn test_to_row_basic_uses_localized_label() {
        let t = Transaction::new(
            NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
            TransactionType::Expense,
            Amount::from_str("45.5").unwrap(),
        );
        let labels = TypeLabels::new("รายจ่าย", "รายรับ");
        let row = t.to_row(Layout::Basic, &labels);
        assert_eq!(row.len(), 6);
        assert_eq!(row[1], Cell::text(""));
        assert_eq!(row[2], Cell::text("รายจ่าย"));
        assert_eq!(row[4], Cell::Number(dec("45.5")));
    }

    #[test]
    fn test_dropped_by_basic() {
        let mut t = Transaction::new(
            NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
            TransactionType::Expense,
            Amount::default(),
        );
        t.channel = String::from("Cash");
        assert_eq!(t.dropped_by(Layout::Basic), vec![Column::Channel]);
        assert!(t.dropped_by(Layout::Full).is_empty());
    }

    #[test]
    fn test_parse_empty_sheet() {
        let rows: Vec<Vec<&str>> = Vec::new();
        let transactions = Transactions::parse(rows, &TypeLabels::default()).unwrap();
        assert!(transactions.is_empty());
        assert_eq!(transactions.layout(), None);
    }

    #[test]
    fn test_parse_header_only() {
        let rows = vec![full_header()];
        let transactions = Transactions::parse(rows, &TypeLabels::default()).unwrap();
        assert!(transactions.is_empty());
        assert_eq!(transactions.layout(), Some(Layout::Full));
    }

    #[test]
    fn test_parse_rows() {
        let rows = vec![
            full_header(),
            vec![
                "2025-03-10",
                "08:15:00",
                "income",
                "Savings",
                "Employer",
                "",
                "Bank app",
                "500",
                "salary",
            ],
            // Trailing empty cells are omitted by the Sheets API.
            vec!["2025-03-10", "12:00", "expense", "Cash", "", "Noodle shop", "", "฿120.00"],
        ];
        let transactions = Transactions::parse(rows, &TypeLabels::default()).unwrap();
        assert!(transactions.issues().is_empty());
        assert_eq!(transactions.len(), 2);

        let first = &transactions.data()[0];
        assert_eq!(first.kind(), TransactionType::Income);
        assert_eq!(first.source(), "Employer");
        assert_eq!(first.time(), NaiveTime::from_hms_opt(8, 15, 0));

        let second = &transactions.data()[1];
        assert_eq!(second.amount().value(), dec("120"));
        assert_eq!(second.destination(), "Noodle shop");
        assert_eq!(second.note(), "");
        assert_eq!(second.time(), NaiveTime::from_hms_opt(12, 0, 0));
    }

    #[test]
    fn test_parse_isolates_bad_rows() {
        let rows = vec![
            vec!["Date", "Time", "Type", "Category", "Amount", "Note"],
            vec!["2025-03-10", "08:15:00", "income", "Salary", "500", ""],
            vec!["not a date", "08:15:00", "expense", "Food", "20", ""],
            vec!["", "", "", "", "", ""],
            vec!["2025-03-11", "", "transfer", "Food", "20", ""],
            vec!["2025-03-11", "", "expense", "Food", "", ""],
            vec!["2025-03-11", "", "expense", "Food", "abc", ""],
            vec!["3/12/2025", "bad time", "expense", "Food", "1,020.25", "ok"],
            vec!["2025-03-13", "", "expense", "Food", "5", "", "extra"],
        ];
        let transactions = Transactions::parse(rows, &TypeLabels::default()).unwrap();
        assert_eq!(transactions.len(), 2);

        let rows: Vec<usize> = transactions.issues().iter().map(|i| i.row).collect();
        assert_eq!(rows, vec![3, 5, 6, 7, 9]);
        assert!(transactions.issues()[0].reason.contains("not a date"));
        assert!(transactions.issues()[1].reason.contains("transfer"));

        let last = &transactions.data()[1];
        assert_eq!(last.date(), NaiveDate::from_ymd_opt(2025, 3, 12).unwrap());
        assert_eq!(last.time(), None);
        assert_eq!(last.amount().value(), dec("1020.25"));
        assert_eq!(last.account(), "Food");
    }

    #[test]
    fn test_parse_bad_header() {
        let rows = vec![vec!["When", "What", "How much"]];
        let err = Transactions::parse(rows, &TypeLabels::default()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorType::SchemaMismatch);
    }

    #[test]
    fn test_recent_is_newest_first() {
        let mut rows: Vec<Vec<String>> = vec![Layout::Basic
            .headers()
            .into_iter()
            .map(String::from)
            .collect()];
        for day in 1..=7 {
            let date = format!("2025-01-{day:02}");
            rows.push(
                [date.as_str(), "", "expense", "Food", "1", ""]
                    .into_iter()
                    .map(String::from)
                    .collect(),
            );
        }
        let transactions = Transactions::parse(rows, &TypeLabels::default()).unwrap();
        let recent = transactions.recent(3);
        let days: Vec<u32> = recent.iter().map(|t| chrono::Datelike::day(&t.date())).collect();
        assert_eq!(days, vec![7, 6, 5]);
        assert_eq!(transactions.recent(100).len(), 7);
    }

    #[test]
    fn test_labels() {
        let labels = TypeLabels::new("รายจ่าย", "รายรับ");
        assert_eq!(labels.parse(" รายรับ "), Some(TransactionType::Income));
        assert_eq!(labels.parse("income"), None);
        assert!(!labels.is_ambiguous());
        assert!(TypeLabels::new("x", "x").is_ambiguous());
    }
}
