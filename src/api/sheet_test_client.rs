//! Implements the `Sheet` trait using in-memory data for testing purposes.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the whole
//! app, top-to-bottom, without using Google Sheets.

use crate::api::{Sheet, SheetRange};
use crate::error::{Error, ErrorType, IntoResult, Res};
use crate::model::Cell;
use crate::Result;
use anyhow::anyhow;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Mutex, MutexGuard, OnceLock};

/// The rows of a test spreadsheet's single worksheet, keyed by spreadsheet ID. `None` marks a
/// spreadsheet that exists but that the current credentials cannot open.
type Spreadsheets = HashMap<String, Option<Vec<Vec<String>>>>;

static SPREADSHEETS: OnceLock<Mutex<Spreadsheets>> = OnceLock::new();

fn spreadsheets() -> Res<MutexGuard<'static, Spreadsheets>> {
    SPREADSHEETS
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .map_err(|_| anyhow!("The test spreadsheet state is poisoned"))
}

/// Replaces the rows of the test spreadsheet `id`. `None` makes it inaccessible.
#[cfg(test)]
pub(crate) fn set_state(id: &str, rows: Option<Vec<Vec<String>>>) -> Res<()> {
    spreadsheets()?.insert(id.to_string(), rows);
    Ok(())
}

/// The rows of the test spreadsheet `id`, seeding it with sample data on first use.
#[cfg(test)]
pub(crate) fn get_state(id: &str) -> Res<Option<Vec<Vec<String>>>> {
    let mut sheets = spreadsheets()?;
    let entry = sheets
        .entry(id.to_string())
        .or_insert_with(|| Some(default_data()));
    Ok(entry.clone())
}

/// An implementation of the `Sheet` trait that does not use Google sheets. State is shared by every
/// `TestSheet` of the same spreadsheet ID in the process, so what one command appends the next
/// command reads.
pub(crate) struct TestSheet {
    spreadsheet_id: String,
}

impl TestSheet {
    pub(crate) fn new(spreadsheet_id: impl Into<String>) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.into(),
        }
    }

    /// Runs `f` on the rows of this spreadsheet, seeding them first if needed.
    fn with_rows<T>(&self, f: impl FnOnce(&mut Vec<Vec<String>>) -> T) -> Result<T> {
        let mut sheets = spreadsheets().pub_result(ErrorType::Unknown)?;
        let rows = sheets
            .entry(self.spreadsheet_id.clone())
            .or_insert_with(|| Some(default_data()));
        match rows {
            Some(rows) => Ok(f(rows)),
            None => Err(Error::msg(
                ErrorType::NotFound,
                format!(
                    "Requested entity was not found: spreadsheet '{}'",
                    self.spreadsheet_id
                ),
            )),
        }
    }
}

#[async_trait::async_trait]
impl Sheet for TestSheet {
    async fn get(&mut self, range: &str) -> Result<Vec<Vec<String>>> {
        let (start, end) = row_bounds(range);
        self.with_rows(|rows| {
            rows.iter()
                .skip(start.saturating_sub(1))
                .take(end.map(|e| e + 1 - start.min(e)).unwrap_or(usize::MAX))
                .cloned()
                .collect()
        })
    }

    async fn append(&mut self, _range: &str, row: Vec<Cell>) -> Result<()> {
        let row: Vec<String> = row
            .into_iter()
            .map(|cell| match cell {
                Cell::Text(s) => s,
                Cell::Number(d) => d.normalize().to_string(),
            })
            .collect();
        self.with_rows(|rows| rows.push(row))
    }

    async fn write_ranges(&mut self, data: &[SheetRange]) -> Result<()> {
        self.with_rows(|rows| {
            for range in data {
                let (start, _) = row_bounds(&range.range);
                for (offset, values) in range.values.iter().enumerate() {
                    let ix = start.max(1) - 1 + offset;
                    if rows.len() <= ix {
                        rows.resize(ix + 1, Vec::new());
                    }
                    rows[ix] = values.clone();
                }
            }
        })
    }
}

/// The 1-based first row and, if bounded, the last row that an A1 range such as `'Tab'!A1:I`,
/// `1:1` or `A:ZZ` refers to. Column letters are ignored.
fn row_bounds(range: &str) -> (usize, Option<usize>) {
    let cells = range.rsplit('!').next().unwrap_or(range);
    let mut parts = cells.split(':');
    let row_of = |part: &str| -> Option<usize> {
        let digits: String = part.chars().filter(|c| c.is_ascii_digit()).collect();
        digits.parse().ok()
    };
    let start = parts.next().and_then(row_of);
    let end = parts.next().and_then(row_of);
    match (start, end) {
        (Some(start), end) => (start, end.or(if cells.contains(':') { None } else { Some(start) })),
        (None, _) => (1, None),
    }
}

/// Provides the seed data for a test spreadsheet: a full header and a few transactions.
fn default_data() -> Vec<Vec<String>> {
    load_csv(TRANSACTION_DATA).unwrap_or_default()
}

/// Loads data from a CSV-formatted string.
fn load_csv(csv_data: &str) -> Res<Vec<Vec<String>>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(Cursor::new(csv_data.as_bytes()));

    let mut rows: Vec<Vec<String>> = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(record.iter().map(|field| field.to_string()).collect());
    }
    Ok(rows)
}

/// Seed transaction data.
const TRANSACTION_DATA: &str = r##"Date,Time,Type,Account,Source,Destination,Channel,Amount,Note
2025-09-25,09:00:00,income,Savings,Employer,,Bank app,"฿30,000.00",September salary
2025-09-27,12:15:00,expense,Cash,,Noodle shop,Cash,฿60.00,lunch
2025-09-30,18:40:00,expense,Credit card,,Supermarket,Credit card,"฿1,250.50",groceries
2025-10-01,08:05:00,expense,Savings,,Electric company,Bank app,฿890.00,
2025-10-01,19:30:00,expense,Cash,,Night market,Scan QR,฿145.00,dinner
2025-10-03,10:00:00,income,High-interest deposit,Bank,,Bank app,฿312.75,interest
2025-10-04,07:45:00,expense,Credit card,,Gas station,Credit card,"฿1,100.00",fuel
"##;
