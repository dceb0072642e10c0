use crate::commands::Out;
use crate::config::AuthMethod;
use crate::error::{ErrorType, IntoResult};
use crate::model::Layout;
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the data directory, its subdirectories and:
/// - Creates an initial `config.json` file using `sheet_url` along with default settings
/// - Moves `credentials` into its default location in the secrets directory.
///
/// # Arguments
/// - `expense_home` - The directory that will be the root of data directory, e.g. `$HOME/expense`
/// - `credentials` - The downloaded OAuth 2.0 desktop client secret, or a service account key when
///   `auth` is `AuthMethod::ServiceAccount`.
/// - `sheet_url` - The URL of the Google Sheet that holds the transactions. It may be empty, in
///   which case a sheet must be chosen per session with `expense sheet set`.
/// - `layout` - The header layout written by `expense header`.
///
/// # Errors
/// - Returns an error if the URL is malformed or if any file operations fail.
pub async fn init(
    expense_home: &Path,
    credentials: &Path,
    sheet_url: &str,
    auth: AuthMethod,
    layout: Layout,
) -> Result<Out<()>> {
    let config = Config::create(expense_home, credentials, sheet_url, auth, layout)
        .await
        .context("Unable to create the data directory and configs")
        .pub_result(ErrorType::Config)?;
    let next = match auth {
        AuthMethod::Oauth => "Run 'expense auth' to sign in to Google",
        AuthMethod::ServiceAccount => "Share the sheet with the service account's email address",
    };
    Ok(format!(
        "Created the expense directory at {}. {next}",
        config.root().display()
    )
    .into())
}
