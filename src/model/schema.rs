//! The row schema shared by the code that writes transactions to the sheet and the code that reads
//! them back. Column order is defined here and nowhere else.

use crate::error::{Error, ErrorType};
use crate::Result;
use serde::{Deserialize, Serialize};

pub(crate) const DATE_STR: &str = "Date";
pub(crate) const TIME_STR: &str = "Time";
pub(crate) const TYPE_STR: &str = "Type";
pub(crate) const ACCOUNT_STR: &str = "Account";
pub(crate) const CATEGORY_STR: &str = "Category";
pub(crate) const SOURCE_STR: &str = "Source";
pub(crate) const DESTINATION_STR: &str = "Destination";
pub(crate) const CHANNEL_STR: &str = "Channel";
pub(crate) const AMOUNT_STR: &str = "Amount";
pub(crate) const NOTE_STR: &str = "Note";

/// A field of a transaction row.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Date,
    Time,
    Type,
    Account,
    Source,
    Destination,
    Channel,
    Amount,
    Note,
}

serde_plain::derive_display_from_serialize!(Column);
serde_plain::derive_fromstr_from_deserialize!(Column);

impl Column {
    /// Whether `header` is an acceptable header cell for this column.
    fn accepts(&self, header: &str, layout: Layout) -> bool {
        match (self, layout) {
            (Column::Account, Layout::Basic) => header == CATEGORY_STR || header == ACCOUNT_STR,
            _ => header == self.header(layout),
        }
    }

    /// The header text written for this column in `layout`.
    pub fn header(&self, layout: Layout) -> &'static str {
        match self {
            Column::Date => DATE_STR,
            Column::Time => TIME_STR,
            Column::Type => TYPE_STR,
            Column::Account => match layout {
                Layout::Basic => CATEGORY_STR,
                Layout::Full => ACCOUNT_STR,
            },
            Column::Source => SOURCE_STR,
            Column::Destination => DESTINATION_STR,
            Column::Channel => CHANNEL_STR,
            Column::Amount => AMOUNT_STR,
            Column::Note => NOTE_STR,
        }
    }
}

/// The two header contracts a worksheet can have.
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
pub enum Layout {
    /// Date, Time, Type, Category, Amount, Note
    Basic,
    /// Date, Time, Type, Account, Source, Destination, Channel, Amount, Note
    #[default]
    Full,
}

serde_plain::derive_display_from_serialize!(Layout);
serde_plain::derive_fromstr_from_deserialize!(Layout);

const BASIC_COLUMNS: &[Column] = &[
    Column::Date,
    Column::Time,
    Column::Type,
    Column::Account,
    Column::Amount,
    Column::Note,
];

const FULL_COLUMNS: &[Column] = &[
    Column::Date,
    Column::Time,
    Column::Type,
    Column::Account,
    Column::Source,
    Column::Destination,
    Column::Channel,
    Column::Amount,
    Column::Note,
];

impl Layout {
    /// The columns of this layout, in sheet order.
    pub fn columns(&self) -> &'static [Column] {
        match self {
            Layout::Basic => BASIC_COLUMNS,
            Layout::Full => FULL_COLUMNS,
        }
    }

    /// The header row of this layout.
    pub fn headers(&self) -> Vec<&'static str> {
        self.columns().iter().map(|c| c.header(*self)).collect()
    }

    pub fn len(&self) -> usize {
        self.columns().len()
    }

    /// Whether the layout has a column for `column`.
    pub fn has(&self, column: Column) -> bool {
        self.columns().contains(&column)
    }

    /// Identifies the layout of a worksheet from its header row. Cells are trimmed and trailing
    /// empty cells are ignored, everything else must match one of the layouts exactly and in
    /// order.
    pub fn detect<S: AsRef<str>>(header_row: &[S]) -> Result<Layout> {
        let mut cells: Vec<&str> = header_row.iter().map(|s| s.as_ref().trim()).collect();
        while cells.last().is_some_and(|c| c.is_empty()) {
            cells.pop();
        }

        for layout in [Layout::Full, Layout::Basic] {
            let columns = layout.columns();
            if cells.len() == columns.len()
                && columns
                    .iter()
                    .zip(cells.iter())
                    .all(|(column, cell)| column.accepts(cell, layout))
            {
                return Ok(layout);
            }
        }

        Err(Error::msg(
            ErrorType::SchemaMismatch,
            format!(
                "The header row [{}] does not match a known layout. Expected [{}] or [{}]",
                cells.join(", "),
                Layout::Full.headers().join(", "),
                Layout::Basic.headers().join(", "),
            ),
        ))
    }
}
