//! Records income and expense transactions as rows of a Google Sheet and summarizes them by day,
//! week, month or year.

mod api;
pub mod args;
pub mod commands;
mod config;
mod error;
pub mod model;
mod report;
mod session;
mod utils;


pub use api::Mode;
pub use config::{AuthMethod, Config};
pub use error::{Error, ErrorType, IntoResult, Result};
pub use report::{Format, EMPTY_PLACEHOLDER};
pub use session::{Session, SessionState};
