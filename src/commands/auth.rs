//! Authentication command handlers.
//!
//! This module implements the CLI commands for:
//! - `expense auth` - Initial OAuth consent flow
//! - `expense auth --verify` - Verify and refresh authentication

use crate::api::{ServiceAccount, TokenProvider};
use crate::commands::Out;
use crate::config::AuthMethod;
use crate::error::{ErrorType, IntoResult};
use crate::{Config, Result};
use anyhow::Context;

/// Handles the `expense auth` command - runs the OAuth consent flow
///
/// This is the only command that asks the user to open a browser. It:
/// 1. Loads `client_secret.json`
/// 2. Prints the consent URL and waits for Google to redirect to a local port
/// 3. Saves tokens to `token.json`
///
/// With a service account there is nothing to consent to, so this fetches a token to prove that
/// the key works.
///
/// # Errors
/// Returns an error if the flow fails, times out, or if the credential file is missing.
pub async fn auth(config: &Config) -> Result<Out<()>> {
    match config.auth_method() {
        AuthMethod::Oauth => {
            TokenProvider::initialize(&config.client_secret_path(), config.token_path())
                .await
                .pub_result(ErrorType::Auth)?;
            Ok("Signed in to Google".into())
        }
        AuthMethod::ServiceAccount => {
            let email = service_account_token(config).await?;
            Ok(format!("The service account {email} is ready, no sign-in is needed").into())
        }
    }
}

/// Handles the `expense auth --verify` command - verifies authentication
///
/// This command never asks the user to open a browser. It loads the cached tokens and refreshes
/// the access token, which proves the refresh token is still accepted.
///
/// # Errors
/// Returns an error telling the user to run `expense auth` if the tokens are missing or rejected.
pub async fn auth_verify(config: &Config) -> Result<Out<()>> {
    match config.auth_method() {
        AuthMethod::Oauth => {
            let mut token_provider =
                TokenProvider::load(&config.client_secret_path(), &config.token_path())
                    .await
                    .context(
                        "Unable to use the existing tokens found in the token JSON file. \n\n\
                        You should run 'expense auth' (without the --verify flag).",
                    )
                    .pub_result(ErrorType::Auth)?;
            token_provider
                .refresh()
                .await
                .context("Unable to refresh the token")
                .pub_result(ErrorType::AuthExpired)?;
            Ok("Your OAuth token is valid!".into())
        }
        AuthMethod::ServiceAccount => {
            let email = service_account_token(config).await?;
            Ok(format!("The service account {email} is valid!").into())
        }
    }
}

async fn service_account_token(config: &Config) -> Result<String> {
    let mut account = ServiceAccount::load(&config.service_account_path())
        .await
        .pub_result(ErrorType::Config)?;
    account.token().await.pub_result(ErrorType::Auth)?;
    Ok(account.email().to_string())
}
