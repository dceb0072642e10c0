//! The per-user session: the PIN lock and the spreadsheet the user chose for this session.
//!
//! The session is persisted to `$EXPENSE_HOME/session.json` so that it survives from one command
//! to the next. It is created on first use and removed by `expense logout`.

use crate::api::{self, Ledger, Mode};
use crate::config::extract_spreadsheet_id;
use crate::error::{Error, ErrorType, IntoResult, Res};
use crate::{utils, Config, Result};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;
use uuid::Uuid;

/// What is saved in `session.json`.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    id: Uuid,
    started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sheet_url: Option<String>,
    #[serde(default)]
    locked: bool,
}

impl SessionState {
    fn new(locked: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            sheet_url: None,
            locked,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// The spreadsheet link the user entered for this session, if any.
    pub fn sheet_url(&self) -> Option<&str> {
        self.sheet_url.as_deref()
    }

    pub fn locked(&self) -> bool {
        self.locked
    }
}

/// Carries everything a data command needs: the loaded `Config`, the `Mode`, and the session state.
#[derive(Debug, Clone)]
pub struct Session {
    config: Config,
    mode: Mode,
    state: SessionState,
    path: PathBuf,
}

impl Session {
    /// Loads the session of `config`, creating it if it does not exist yet. A new session starts
    /// locked when a PIN is configured.
    pub async fn open(config: Config, mode: Mode) -> Result<Self> {
        let path = config.session_path();
        let state = if path.is_file() {
            utils::deserialize(&path)
                .await
                .context("The session file is corrupt, run 'expense logout' to reset it")
                .pub_result(ErrorType::Config)?
        } else {
            let state = SessionState::new(config.pin().is_some());
            debug!("Starting session {}", state.id);
            state
        };
        let session = Self {
            config,
            mode,
            state,
            path,
        };
        session.save().await.pub_result(ErrorType::Config)?;
        Ok(session)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    async fn save(&self) -> Res<()> {
        let json =
            serde_json::to_string_pretty(&self.state).context("Unable to serialize the session")?;
        utils::write(&self.path, json).await
    }

    /// Removes the session file and the OAuth token file. Returns the paths that were removed.
    pub async fn logout(self) -> Result<Vec<PathBuf>> {
        let mut removed = Vec::new();
        for path in [self.path.clone(), self.config.token_path()] {
            if utils::remove(&path).await.pub_result(ErrorType::Config)? {
                removed.push(path);
            }
        }
        Ok(removed)
    }

    /// The URL of the spreadsheet in use: the one entered for this session, else the configured
    /// one.
    pub fn sheet_url(&self) -> &str {
        self.state
            .sheet_url
            .as_deref()
            .unwrap_or(self.config.sheet_url())
    }

    /// The ID of the spreadsheet in use.
    pub fn spreadsheet_id(&self) -> Result<String> {
        let id = match self.state.sheet_url.as_deref() {
            Some(url) => extract_spreadsheet_id(url).pub_result(ErrorType::Validation)?,
            None => self.config.spreadsheet_id(),
        };
        if id.is_empty() {
            return Err(Error::msg(
                ErrorType::NotFound,
                "No spreadsheet is configured for this session",
            ));
        }
        Ok(id.to_string())
    }

    /// Uses the spreadsheet at `url` for the rest of the session.
    pub async fn set_sheet(&mut self, url: &str) -> Result<()> {
        let id = extract_spreadsheet_id(url).pub_result(ErrorType::Validation)?;
        if id.is_empty() {
            return Err(Error::msg(ErrorType::Validation, "The spreadsheet link is empty"));
        }
        self.state.sheet_url = Some(url.trim().to_string());
        self.save().await.pub_result(ErrorType::Config)
    }

    /// Goes back to the configured spreadsheet.
    pub async fn clear_sheet(&mut self) -> Result<()> {
        self.state.sheet_url = None;
        self.save().await.pub_result(ErrorType::Config)
    }

    /// Returns a `Locked` error if the session is locked.
    pub fn ensure_unlocked(&self) -> Result<()> {
        if self.state.locked {
            return Err(Error::msg(ErrorType::Locked, "The session is locked"));
        }
        Ok(())
    }

    pub async fn lock(&mut self) -> Result<()> {
        self.state.locked = true;
        self.save().await.pub_result(ErrorType::Config)
    }

    /// Unlocks the session if `pin` matches the configured PIN. Without a configured PIN the
    /// session is simply unlocked.
    pub async fn unlock(&mut self, pin: &str) -> Result<()> {
        if let Some(expected) = self.config.pin() {
            if pin != expected {
                return Err(Error::msg(ErrorType::Validation, "Incorrect PIN"));
            }
        }
        self.state.locked = false;
        self.save().await.pub_result(ErrorType::Config)
    }

    /// The `Ledger` for the spreadsheet in use. Fails with `Locked` when the session is locked.
    pub(crate) async fn ledger(&self) -> Result<Box<dyn Ledger + Send>> {
        self.ensure_unlocked()?;
        let id = self.spreadsheet_id()?;
        api::ledger(&self.config, &id, self.mode).await
    }
}
