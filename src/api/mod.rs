//! The boundary with Google: credentials, the `Sheet` trait that reads and writes cell values, and
//! the `Ledger` trait that reads and writes transactions on top of it.

mod callback;
mod files;
mod ledger;
mod oauth;
mod sheet;
mod sheet_test_client;

use crate::error::{ErrorType, IntoResult};
use crate::model::{Cell, Layout, Transaction, Transactions};
use crate::{Config, Result};
use ledger::LedgerImpl;
use sheet::GoogleSheet;

pub(crate) use oauth::{Credentials, ServiceAccount, TokenProvider};
pub(crate) use sheet_test_client::TestSheet;
#[cfg(test)]
pub(crate) use sheet_test_client::{
    get_state as test_sheet_state, set_state as set_test_sheet_state,
};

/// The only scope needed to read and append to a spreadsheet that the user can open.
pub(crate) const OAUTH_SCOPES: &[&str] = &["https://www.googleapis.com/auth/spreadsheets"];

/// The environment variable that switches the app to `Mode::Test`.
const TEST_MODE_ENV: &str = "EXPENSE_SHEET_IN_TEST_MODE";

/// Whether to talk to Google or to an in-memory spreadsheet.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub enum Mode {
    #[default]
    Google,
    Test,
}

impl Mode {
    /// `Mode::Test` when `EXPENSE_SHEET_IN_TEST_MODE` is set to a non-empty value.
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(value) if !value.is_empty() => Mode::Test,
            _ => Mode::Google,
        }
    }
}

/// A block of values to write, anchored at an A1 range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SheetRange {
    pub(crate) range: String,
    pub(crate) values: Vec<Vec<String>>,
}

/// Cell-level access to one spreadsheet.
#[async_trait::async_trait]
pub(crate) trait Sheet: Send {
    /// The formatted values in `range`, row by row. Trailing empty cells and rows are omitted.
    async fn get(&mut self, range: &str) -> Result<Vec<Vec<String>>>;

    /// Appends `row` after the last row of the table that `range` is in.
    async fn append(&mut self, range: &str, row: Vec<Cell>) -> Result<()>;

    /// Overwrites cells with `data`.
    async fn write_ranges(&mut self, data: &[SheetRange]) -> Result<()>;
}

/// Transaction-level access to the worksheet that holds transactions.
#[async_trait::async_trait]
pub(crate) trait Ledger: Send {
    /// The layout of the header row, or `None` when the worksheet is empty.
    async fn header(&mut self) -> Result<Option<Layout>>;

    /// Writes the header row of `layout` into row 1.
    async fn write_header(&mut self, layout: Layout) -> Result<()>;

    /// Appends `transaction` as a row in the layout of the existing header, and returns that
    /// layout.
    async fn append(&mut self, transaction: &Transaction) -> Result<Layout>;

    /// Reads and parses every row.
    async fn transactions(&mut self) -> Result<Transactions>;
}

/// Constructs the `Ledger` for `spreadsheet_id` in the given `mode`.
pub(crate) async fn ledger(
    config: &Config,
    spreadsheet_id: &str,
    mode: Mode,
) -> Result<Box<dyn Ledger + Send>> {
    let sheet = sheet(config, spreadsheet_id, mode).await?;
    Ok(Box::new(LedgerImpl::new(
        sheet,
        config.worksheet().map(String::from),
        config.labels().clone(),
    )))
}

async fn sheet(config: &Config, spreadsheet_id: &str, mode: Mode) -> Result<Box<dyn Sheet>> {
    match mode {
        Mode::Test => Ok(Box::new(TestSheet::new(spreadsheet_id))),
        Mode::Google => {
            let credentials = Credentials::load(config)
                .await
                .pub_result(ErrorType::Config)?;
            let sheet =
                GoogleSheet::new(spreadsheet_id, credentials).pub_result(ErrorType::Unknown)?;
            Ok(Box::new(sheet))
        }
    }
}

/// An A1 range on `worksheet`, or on the first worksheet when it is `None`. The sheet name is
/// quoted so that names with spaces or punctuation work.
pub(crate) fn range(worksheet: Option<&str>, cells: &str) -> String {
    match worksheet {
        Some(name) => format!("'{}'!{cells}", name.replace('\'', "''")),
        None => cells.to_string(),
    }
}
