//! Google credentials: the interactive OAuth 2.0 flow for desktop apps, token refresh, and service
//! account keys.
//!
//! The OAuth flow uses PKCE and a loopback redirect:
//! - Load the client secret from `client_secret.json`
//! - Start a local HTTP server on 127.0.0.1 with an OS-assigned port
//! - Print the Google consent URL for the user to open
//! - Receive the authorization code on the local server and check the CSRF state
//! - Exchange the code for access and refresh tokens and save them to `token.json`

use crate::api::callback::CallbackServer;
use crate::api::files::{File, SecretFile, TokenFile};
use crate::api::OAUTH_SCOPES;
use crate::config::AuthMethod;
use crate::error::{Error, ErrorType, Res};
use crate::Config;
use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use oauth2::basic::{BasicClient, BasicErrorResponseType, BasicTokenResponse};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, RedirectUrl, RefreshToken, RequestTokenError, Scope, TokenResponse,
    TokenUrl,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// How long to wait for the user to finish signing in.
const CONSENT_TIMEOUT: Duration = Duration::from_secs(300);

type OAuthClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Holds the client secret and the token file, and refreshes the access token when it is about to
/// expire.
pub(crate) struct TokenProvider {
    secret: SecretFile,
    token: File<TokenFile>,
}

impl TokenProvider {
    /// Runs the interactive consent flow and saves the resulting tokens to `token_path`.
    pub(crate) async fn initialize(secret_path: &Path, token_path: PathBuf) -> Res<Self> {
        let secret = SecretFile::load(secret_path).await?;
        let server = CallbackServer::bind().await?;
        let redirect_uri = server.redirect_uri();
        let client = oauth_client(&secret)?.set_redirect_uri(
            RedirectUrl::new(redirect_uri.clone()).context("Invalid redirect URI")?,
        );

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let (auth_url, csrf_state) = client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(OAUTH_SCOPES.iter().map(|s| Scope::new(s.to_string())))
            .set_pkce_challenge(pkce_challenge)
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .url();

        info!("Open this URL in your browser to sign in to Google:\n\n{auth_url}\n");
        info!("Waiting for the redirect to {redirect_uri}");

        let code = server
            .wait_for_code(csrf_state.secret(), CONSENT_TIMEOUT)
            .await?;
        debug!("Received an authorization code, exchanging it for tokens");

        let http = http_client()?;
        let response = client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pkce_verifier)
            .request_async(&http)
            .await
            .map_err(|e| Error::new(ErrorType::Auth, anyhow!("{e}")))
            .context("Failed to exchange the authorization code for tokens")?;

        let refresh_token = response
            .refresh_token()
            .map(|t| t.secret().to_string())
            .ok_or_else(|| {
                Error::msg(
                    ErrorType::Auth,
                    "Google did not return a refresh token. Remove this app's access from your \
                    Google account and run 'expense auth' again",
                )
            })?;
        let scopes = response
            .scopes()
            .map(|scopes| scopes.iter().map(|s| s.to_string()).collect())
            .unwrap_or_else(|| OAUTH_SCOPES.iter().map(|s| s.to_string()).collect());
        let token = TokenFile::new(
            scopes,
            response.access_token().secret().to_string(),
            refresh_token,
            expires_at(&response),
            None,
        );
        let token = File::new(token_path, token);
        token.save().await?;
        info!("Tokens saved to {}", token.path().display());

        Ok(Self { secret, token })
    }

    /// Loads existing credentials without any user interaction.
    pub(crate) async fn load(secret_path: &Path, token_path: &Path) -> Res<Self> {
        let secret = SecretFile::load(secret_path).await?;
        let token = TokenFile::load(token_path).await?;
        Ok(Self { secret, token })
    }

    /// Exchanges the refresh token for a new access token and saves it.
    pub(crate) async fn refresh(&mut self) -> Res<()> {
        debug!("Refreshing the OAuth access token");
        let client = oauth_client(&self.secret)?;
        let http = http_client()?;
        let refresh_token = RefreshToken::new(self.token.data().refresh_token().to_string());
        let response = match client
            .exchange_refresh_token(&refresh_token)
            .request_async(&http)
            .await
        {
            Ok(response) => response,
            Err(RequestTokenError::ServerResponse(e))
                if *e.error() == BasicErrorResponseType::InvalidGrant =>
            {
                return Err(Error::msg(
                    ErrorType::AuthExpired,
                    format!("The refresh token was rejected: {e}"),
                )
                .into());
            }
            Err(e) => return Err(anyhow!("Failed to refresh the access token: {e}")),
        };

        let new_refresh_token = response.refresh_token().map(|t| t.secret().to_string());
        let expires_at = expires_at(&response);
        self.token.data_mut().update(
            response.access_token().secret().to_string(),
            expires_at,
            new_refresh_token,
        );
        self.token.save().await?;
        debug!("Access token valid until {}", self.token.data().expires_at());
        Ok(())
    }

    /// Returns the access token, refreshing it first if it expires within five minutes.
    pub(crate) async fn token_with_refresh(&mut self) -> Res<&str> {
        if self.token.data().is_expired() {
            self.refresh().await?;
        }
        Ok(self.token())
    }

    pub(crate) fn token(&self) -> &str {
        self.token.data().access_token()
    }
}

/// A service account needs no interaction. The access token is fetched once and kept for the life
/// of the process.
pub(crate) struct ServiceAccount {
    key: yup_oauth2::ServiceAccountKey,
    token: Option<String>,
}

impl ServiceAccount {
    pub(crate) async fn load(path: &Path) -> Res<Self> {
        if !path.is_file() {
            return Err(Error::msg(
                ErrorType::Config,
                format!("The service account key is missing '{}'", path.display()),
            )
            .into());
        }
        let key = yup_oauth2::read_service_account_key(path)
            .await
            .map_err(|e| Error::new(ErrorType::Config, e))
            .with_context(|| format!("Unable to read the service account key {}", path.display()))?;
        debug!("Loaded the service account key for {}", key.client_email);
        Ok(Self { key, token: None })
    }

    pub(crate) fn email(&self) -> &str {
        &self.key.client_email
    }

    pub(crate) async fn token(&mut self) -> Res<&str> {
        if self.token.is_none() {
            let auth = yup_oauth2::ServiceAccountAuthenticator::builder(self.key.clone())
                .build()
                .await
                .context("Failed to create the service account authenticator")?;
            let token = auth
                .token(OAUTH_SCOPES)
                .await
                .map_err(|e| Error::new(ErrorType::Auth, e))
                .context("Failed to get a token for the service account")?;
            let token = token
                .token()
                .ok_or_else(|| Error::msg(ErrorType::Auth, "Google returned an empty token"))?;
            self.token = Some(token.to_string());
        }
        self.token
            .as_deref()
            .ok_or_else(|| anyhow!("The service account token is missing"))
    }
}

/// The credentials used to call the Sheets API.
pub(crate) enum Credentials {
    OAuth(TokenProvider),
    ServiceAccount(ServiceAccount),
}

impl Credentials {
    /// Loads whichever credentials the config asks for.
    pub(crate) async fn load(config: &Config) -> Res<Self> {
        match config.auth_method() {
            AuthMethod::Oauth => Ok(Credentials::OAuth(
                TokenProvider::load(&config.client_secret_path(), &config.token_path()).await?,
            )),
            AuthMethod::ServiceAccount => Ok(Credentials::ServiceAccount(
                ServiceAccount::load(&config.service_account_path()).await?,
            )),
        }
    }

    /// A valid access token.
    pub(crate) async fn token(&mut self) -> Res<String> {
        match self {
            Credentials::OAuth(provider) => Ok(provider.token_with_refresh().await?.to_string()),
            Credentials::ServiceAccount(account) => Ok(account.token().await?.to_string()),
        }
    }
}

fn oauth_client(secret: &SecretFile) -> Res<OAuthClient> {
    Ok(BasicClient::new(ClientId::new(secret.client_id().to_string()))
        .set_client_secret(ClientSecret::new(secret.client_secret().to_string()))
        .set_auth_uri(
            AuthUrl::new(secret.auth_uri().to_string())
                .map_err(|e| Error::new(ErrorType::Config, e))
                .context("Invalid auth_uri in the client secret file")?,
        )
        .set_token_uri(
            TokenUrl::new(secret.token_uri().to_string())
                .map_err(|e| Error::new(ErrorType::Config, e))
                .context("Invalid token_uri in the client secret file")?,
        ))
}

/// Following redirects during a token exchange would expose the client to SSRF.
fn http_client() -> Res<reqwest::Client> {
    reqwest::ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .context("Unable to create the HTTP client")
}

fn expires_at(response: &BasicTokenResponse) -> DateTime<Utc> {
    // Google access tokens last an hour when the response does not say otherwise.
    let lifetime = response
        .expires_in()
        .and_then(|d| chrono::Duration::from_std(d).ok())
        .unwrap_or_else(|| chrono::Duration::hours(1));
    Utc::now() + lifetime
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IntoResult;
    use crate::utils;
    use tempfile::TempDir;

    const SECRET: &str = r#"{
        "installed": {
            "client_id": "id.apps.googleusercontent.com",
            "client_secret": "shh",
            "redirect_uris": ["http://localhost"],
            "auth_uri": "https://accounts.google.com/o/oauth2/auth",
            "token_uri": "https://oauth2.googleapis.com/token"
        }
    }"#;

    #[tokio::test]
    async fn test_load_without_token_is_auth_error() {
        let dir = TempDir::new().unwrap();
        let secret = dir.path().join("client_secret.json");
        utils::write(&secret, SECRET).await.unwrap();
        let err = TokenProvider::load(&secret, &dir.path().join("token.json"))
            .await
            .map(|_| ())
            .pub_result(ErrorType::Unknown)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorType::Auth);
    }

    #[tokio::test]
    async fn test_fresh_token_is_not_refreshed() {
        let dir = TempDir::new().unwrap();
        let secret = dir.path().join("client_secret.json");
        utils::write(&secret, SECRET).await.unwrap();
        let token_path = dir.path().join("token.json");
        let token = TokenFile::new(
            OAUTH_SCOPES.iter().map(|s| s.to_string()).collect(),
            "access".to_string(),
            "refresh".to_string(),
            Utc::now() + chrono::Duration::hours(1),
            None,
        );
        File::new(&token_path, token).save().await.unwrap();

        let mut provider = TokenProvider::load(&secret, &token_path).await.unwrap();
        assert_eq!(provider.token_with_refresh().await.unwrap(), "access");
    }

    #[tokio::test]
    async fn test_missing_service_account_key_is_config_error() {
        let dir = TempDir::new().unwrap();
        let err = ServiceAccount::load(&dir.path().join("key.json"))
            .await
            .map(|_| ())
            .pub_result(ErrorType::Unknown)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorType::Config);
    }

    #[test]
    fn test_oauth_client_rejects_bad_uri() {
        let secret: SecretFile = serde_json::from_str(
            &SECRET.replace("https://oauth2.googleapis.com/token", "not a url"),
        )
        .unwrap();
        assert!(oauth_client(&secret).is_err());
    }
}
