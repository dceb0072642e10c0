//! Error types for the `expense` crate.
//!
//! Internally, functions return `Res<T>`, which is an `anyhow::Result`. At the boundaries (the
//! spreadsheet access layer and the command handlers) errors are converted into the public `Error`
//! type, which carries an `ErrorType` so that the caller can decide what message to show and what
//! recovery action to offer.

use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};

/// The internal result type.
pub(crate) type Res<T> = anyhow::Result<T>;

/// The public result type.
pub type Result<T> = std::result::Result<T, Error>;

/// The kind of failure that occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// Missing or invalid configuration or credential files. This is fatal.
    Config,
    /// The OAuth flow did not complete.
    Auth,
    /// The stored credentials were rejected and the user needs to authenticate again.
    AuthExpired,
    /// The spreadsheet or worksheet does not exist or is not accessible with these credentials.
    NotFound,
    /// The header row of the worksheet does not match a known row layout.
    SchemaMismatch,
    /// The user provided input that was rejected.
    Validation,
    /// The session is locked by the PIN gate.
    Locked,
    /// Anything else, for example a network failure.
    Unknown,
}

serde_plain::derive_display_from_serialize!(ErrorType);
serde_plain::derive_fromstr_from_deserialize!(ErrorType);

impl ErrorType {
    /// The action the user can take to recover, if there is one.
    pub fn recovery(&self) -> Option<&'static str> {
        match self {
            ErrorType::Config => Some(
                "Check config.json, including the worksheet name, and the credential files, or run \
                'expense init' to create them.",
            ),
            ErrorType::Auth | ErrorType::AuthExpired => {
                Some("Run 'expense auth' to sign in to Google again.")
            }
            ErrorType::NotFound => Some(
                "Check that the spreadsheet link is correct and shared with your account, then \
                enter it again with 'expense sheet set <URL>'.",
            ),
            ErrorType::SchemaMismatch => Some(
                "The first row of the worksheet must hold the column headers. Run 'expense header' \
                to write them into an empty worksheet.",
            ),
            ErrorType::Locked => Some("Run 'expense unlock --pin <PIN>'."),
            ErrorType::Validation | ErrorType::Unknown => None,
        }
    }
}

/// The public error type. It wraps an `anyhow::Error` and tags it with an `ErrorType`.
pub struct Error {
    kind: ErrorType,
    inner: anyhow::Error,
}

impl Error {
    pub fn new(kind: ErrorType, inner: impl Into<anyhow::Error>) -> Self {
        Self {
            kind,
            inner: inner.into(),
        }
    }

    /// Create an error from a message.
    pub fn msg<M>(kind: ErrorType, message: M) -> Self
    where
        M: Display + Debug + Send + Sync + 'static,
    {
        Self::new(kind, anyhow::Error::msg(message))
    }

    pub fn kind(&self) -> ErrorType {
        self.kind
    }

    /// Wraps `inner` with `fallback` unless an `Error` is already somewhere in its chain, in which
    /// case the kind of the innermost-known `Error` wins.
    fn from_anyhow(fallback: ErrorType, inner: anyhow::Error) -> Self {
        let kind = inner
            .chain()
            .find_map(|e| e.downcast_ref::<Error>().map(Error::kind))
            .unwrap_or(fallback);
        Self { kind, inner }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#}", self.inner)
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} error: {:?}", self.kind, self.inner)
    }
}

// `Display` already prints the whole chain of `inner`, so `source` is left as `None`.
impl std::error::Error for Error {}

/// Converts an internal result into a public one.
pub trait IntoResult<T> {
    fn pub_result(self, kind: ErrorType) -> Result<T>;
}

impl<T> IntoResult<T> for Res<T> {
    fn pub_result(self, kind: ErrorType) -> Result<T> {
        self.map_err(|e| Error::from_anyhow(kind, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    fn not_found() -> Result<()> {
        Err(Error::msg(ErrorType::NotFound, "no such spreadsheet"))
    }

    fn wrapped() -> Res<()> {
        not_found().context("Unable to read the header row")?;
        Ok(())
    }

    #[test]
    fn test_pub_result_keeps_inner_kind() {
        let err = wrapped().pub_result(ErrorType::Unknown).unwrap_err();
        assert_eq!(err.kind(), ErrorType::NotFound);
        let message = err.to_string();
        assert!(message.contains("Unable to read the header row"));
        assert!(message.contains("no such spreadsheet"));
    }

    #[test]
    fn test_pub_result_uses_fallback() {
        let res: Res<()> = Err(anyhow::anyhow!("boom"));
        let err = res.pub_result(ErrorType::Config).unwrap_err();
        assert_eq!(err.kind(), ErrorType::Config);
    }

    #[test]
    fn test_recovery_hints() {
        assert!(ErrorType::NotFound.recovery().unwrap().contains("sheet set"));
        assert!(ErrorType::Validation.recovery().is_none());
        assert_eq!(ErrorType::AuthExpired.to_string(), "auth_expired");
    }
}
