//! Implements the `Ledger` trait for a worksheet whose first row is one of the known header rows.

use crate::api::{range, Ledger, Sheet, SheetRange};
use crate::error::{Error, ErrorType};
use crate::model::{Layout, Transaction, Transactions, TypeLabels};
use crate::Result;
use tracing::{debug, warn};

const HEADER_ROW: &str = "1:1";
const ALL_ROWS: &str = "A:ZZ";
const FIRST_CELL: &str = "A1";

pub(super) struct LedgerImpl {
    sheet: Box<dyn Sheet>,
    worksheet: Option<String>,
    labels: TypeLabels,
}

impl LedgerImpl {
    /// Create a new `LedgerImpl` object that will use a dynamically-dispatched `sheet` to get and
    /// send its data.
    pub(super) fn new(sheet: Box<dyn Sheet>, worksheet: Option<String>, labels: TypeLabels) -> Self {
        Self {
            sheet,
            worksheet,
            labels,
        }
    }

    fn range(&self, cells: &str) -> String {
        range(self.worksheet.as_deref(), cells)
    }
}

#[async_trait::async_trait]
impl Ledger for LedgerImpl {
    async fn header(&mut self) -> Result<Option<Layout>> {
        let rows = self.sheet.get(&self.range(HEADER_ROW)).await?;
        match rows.first() {
            Some(row) if row.iter().any(|c| !c.trim().is_empty()) => {
                Layout::detect(row.as_slice()).map(Some)
            }
            _ => Ok(None),
        }
    }

    async fn write_header(&mut self, layout: Layout) -> Result<()> {
        let values = vec![layout.headers().into_iter().map(String::from).collect()];
        let data = [SheetRange {
            range: self.range(FIRST_CELL),
            values,
        }];
        self.sheet.write_ranges(&data).await
    }

    async fn append(&mut self, transaction: &Transaction) -> Result<Layout> {
        let layout = self.header().await?.ok_or_else(|| {
            Error::msg(
                ErrorType::SchemaMismatch,
                "The worksheet has no header row, so the column order is unknown",
            )
        })?;
        let dropped = transaction.dropped_by(layout);
        if !dropped.is_empty() {
            let names: Vec<String> = dropped.iter().map(|c| c.to_string()).collect();
            warn!(
                "The worksheet has the {layout} layout, which has no column for: {}. These \
                fields were not saved",
                names.join(", ")
            );
        }
        let row = transaction.to_row(layout, &self.labels);
        self.sheet.append(&self.range(FIRST_CELL), row).await?;
        debug!("Appended a row with the {layout} layout");
        Ok(layout)
    }

    async fn transactions(&mut self) -> Result<Transactions> {
        let rows = self.sheet.get(&self.range(ALL_ROWS)).await?;
        let transactions = Transactions::parse(rows, &self.labels)?;
        for issue in transactions.issues() {
            warn!("Row {} was skipped: {}", issue.row, issue.reason);
        }
        Ok(transactions)
    }
}
