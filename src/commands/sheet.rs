//! `expense sheet`: shows or changes which spreadsheet this session uses.
//!
//! A link the user types in is untrusted. It has to look like a Google Sheets link, and the sheet
//! has to be readable with the current credentials, before it is stored.

use crate::api;
use crate::commands::Out;
use crate::config::extract_spreadsheet_id;
use crate::error::{Error, ErrorType, IntoResult};
use crate::{Result, Session};
use serde::Serialize;
use tracing::debug;

/// The spreadsheet in use.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct SheetInfo {
    pub sheet_url: String,
    pub spreadsheet_id: String,
    /// True when the link was entered for this session rather than read from `config.json`.
    pub overridden: bool,
}

fn info(session: &Session) -> Result<SheetInfo> {
    Ok(SheetInfo {
        sheet_url: session.sheet_url().to_string(),
        spreadsheet_id: session.spreadsheet_id()?,
        overridden: session.state().sheet_url().is_some(),
    })
}

pub async fn sheet_show(session: &Session) -> Result<Out<SheetInfo>> {
    let info = info(session)?;
    let source = if info.overridden {
        "entered for this session"
    } else {
        "from config.json"
    };
    Ok(Out::new(
        format!("Using spreadsheet {} ({source})", info.spreadsheet_id),
        info.clone(),
    )
    .with_display(info.sheet_url))
}

/// Checks that `url` points at a readable spreadsheet, then stores it in the session. Nothing is
/// stored when either check fails.
pub async fn sheet_set(session: &mut Session, url: &str) -> Result<Out<SheetInfo>> {
    session.ensure_unlocked()?;
    let id = extract_spreadsheet_id(url).pub_result(ErrorType::Validation)?;
    if id.is_empty() {
        return Err(Error::msg(
            ErrorType::Validation,
            "The spreadsheet link is empty",
        ));
    }

    let mut ledger = api::ledger(session.config(), id, session.mode()).await?;
    let layout = ledger.header().await?;
    debug!("The new spreadsheet has header layout {layout:?}");

    session.set_sheet(url).await?;
    let info = info(session)?;
    Ok(Out::new(
        format!("Now using spreadsheet {}", info.spreadsheet_id),
        info,
    ))
}

pub async fn sheet_clear(session: &mut Session) -> Result<Out<SheetInfo>> {
    session.clear_sheet().await?;
    let info = info(session)?;
    Ok(Out::new(
        format!(
            "Back to the configured spreadsheet {}",
            info.spreadsheet_id
        ),
        info,
    ))
}
