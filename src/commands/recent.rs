use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::model::Transaction;
use crate::report::{self, Format, TransactionRow};
use crate::{Result, Session};

/// How many transactions `expense recent` shows by default.
pub const DEFAULT_RECENT: usize = 5;

/// The last `count` rows of the worksheet, newest first.
pub async fn recent(session: &Session, count: usize, format: Format) -> Result<Out<Vec<Transaction>>> {
    let mut ledger = session.ledger().await?;
    let transactions = ledger.transactions().await?;
    let rows = transactions.recent(count);
    let labels = session.config().labels();
    let display = report::render(&rows, format, |t| TransactionRow::new(t, labels))
        .pub_result(ErrorType::Unknown)?;
    let message = format!(
        "Showing {} of {} transactions",
        rows.len(),
        transactions.len()
    );
    Ok(Out::new(message, rows).with_display(display))
}
