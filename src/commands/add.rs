use crate::args::AddArgs;
use crate::commands::Out;
use crate::error::{Error, ErrorType};
use crate::model::Transaction;
use crate::{Result, Session};
use chrono::{Local, Timelike};
use tracing::debug;

/// Validates the entry and appends it to the worksheet in the column order of its header row.
/// Returns the transaction that was written.
///
/// - The amount must not be negative.
/// - When `accounts` or `channels` are configured, the account or channel must be one of them.
/// - Date and time default to the local date and time.
pub async fn add(session: &Session, args: &AddArgs) -> Result<Out<Transaction>> {
    session.ensure_unlocked()?;
    let transaction = build(session, args)?;

    let mut ledger = session.ledger().await?;
    let layout = ledger.append(&transaction).await?;
    debug!("Appended {transaction:?} using the {layout} layout");

    Ok(Out::new(
        format!(
            "Recorded {} of {} on {}",
            transaction.kind(),
            transaction.amount(),
            transaction.date()
        ),
        transaction,
    ))
}

fn build(session: &Session, args: &AddArgs) -> Result<Transaction> {
    if args.amount().is_negative() {
        return Err(Error::msg(
            ErrorType::Validation,
            format!("The amount cannot be negative, got {}", args.amount()),
        ));
    }
    let config = session.config();
    check_choice("account", args.account(), config.accounts())?;
    check_choice("channel", args.channel(), config.channels())?;

    let now = Local::now().naive_local();
    let time = args
        .time()
        .unwrap_or_else(|| now.time().with_nanosecond(0).unwrap_or(now.time()));

    let mut transaction = Transaction::new(
        args.date().unwrap_or(now.date()),
        args.kind(),
        args.amount(),
    );
    transaction.time = Some(time);
    transaction.account = args.account().trim().to_string();
    transaction.source = args.source().trim().to_string();
    transaction.destination = args.destination().trim().to_string();
    transaction.channel = args.channel().trim().to_string();
    transaction.note = args.note().trim().to_string();
    Ok(transaction)
}

/// An empty list of `choices` allows any value.
fn check_choice(field: &str, value: &str, choices: &[String]) -> Result<()> {
    if choices.is_empty() || choices.iter().any(|c| c == value.trim()) {
        return Ok(());
    }
    Err(Error::msg(
        ErrorType::Validation,
        format!(
            "'{value}' is not a configured {field}. Choose one of: {}",
            choices.join(", ")
        ),
    ))
}
