//! Command handlers for the expense CLI.
//!
//! This module contains implementations for all CLI subcommands.

mod add;
mod auth;
mod header;
mod init;
mod lock;
mod recent;
mod sheet;
mod summary;

use serde::Serialize;
use std::fmt::Debug;
use tracing::{debug, info};

pub use add::add;
pub use auth::{auth, auth_verify};
pub use header::header;
pub use init::init;
pub use lock::{lock, logout, unlock};
pub use recent::{recent, DEFAULT_RECENT};
pub use sheet::{sheet_clear, sheet_set, sheet_show, SheetInfo};
pub use summary::{breakdown, summary, Breakdown, Summary};

/// The output type for a command. This allows the command to return a consistent message,
/// optionally a rendered report for the terminal, and optionally structured data.
#[derive(Debug, Clone, Serialize)]
pub struct Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// A message that can be printed to the user regarding the outcome of the command execution.
    message: String,

    /// A rendered table or summary, printed to stdout so it can be piped.
    #[serde(skip_serializing_if = "Option::is_none")]
    display: Option<String>,

    /// Any structured data that needs to be output from the call.
    structure: Option<T>,
}

impl<T, S> From<S> for Out<T>
where
    T: Debug + Clone + Serialize,
    S: Into<String>,
{
    fn from(value: S) -> Self {
        Out::new_message(value)
    }
}

impl<T> Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// Create a new `Out` object that has `Some(structure)`.
    pub fn new<S>(message: S, structure: T) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            display: None,
            structure: Some(structure),
        }
    }

    /// Create a new `Out` object that has `None` for `structure`.
    pub fn new_message<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            display: None,
            structure: None,
        }
    }

    /// Attach a rendered report.
    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    /// Get the `message`.
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn display(&self) -> Option<&str> {
        self.display.as_deref()
    }

    /// Get the structured data stored in `structure`.
    pub fn structure(&self) -> Option<&T> {
        self.structure.as_ref()
    }

    /// Print the message to `info!`, the rendered report to stdout, and the structured data (if
    /// it exists) as JSON to `debug!`.
    pub fn print(&self) {
        info!("{}", self.message);
        if let Some(display) = self.display() {
            println!("{display}");
        }
        if let Some(structure) = self.structure() {
            if let Ok(json) = serde_json::to_string_pretty(structure) {
                debug!("Command output:\n\n{json}\n\n");
            }
        }
    }
}
