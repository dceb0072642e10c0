//! Serialization and deserialization structures for Google credential files.
//! - `client_secret.json`: OAuth 2.0 desktop client credentials from Google Cloud Console
//! - `token.json`: the tokens we receive from Google at the end of the OAuth flow

use crate::api::OAUTH_SCOPES;
use crate::error::{Error, ErrorType, Res};
use crate::utils;
use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

/// One of these redirects needs to be present in the OAuth credential file. Google allows any port
/// on a loopback redirect, which is what the local callback server relies on.
const REDIRECTS: &[&str] = &["http://localhost", "http://127.0.0.1"];

/// Represents a file that we want to `Serialize`, `Deserialize`, and read from memory in-between
/// serializations and deserialization. Basically we are just holding the `path` and the `data`
/// here.
#[derive(Default, Debug, Clone)]
pub(super) struct File<F>
where
    F: Serialize + DeserializeOwned + Clone + Debug,
{
    path: PathBuf,
    data: F,
}

impl<F> File<F>
where
    F: Serialize + DeserializeOwned + Clone + Debug,
{
    pub(super) async fn load(path: impl Into<PathBuf>) -> Res<Self> {
        let path = path.into();
        let data: F = utils::deserialize(&path).await?;
        Ok(Self { path, data })
    }

    pub(super) fn new(path: impl Into<PathBuf>, data: F) -> Self {
        Self {
            path: path.into(),
            data,
        }
    }

    /// Saves the data with owner-only permissions, since these files hold secrets.
    pub(super) async fn save(&self) -> Res<()> {
        let json =
            serde_json::to_string_pretty(&self.data).context("Failed to serialize data to JSON")?;
        utils::write_secret(&self.path, json).await
    }

    pub(super) fn data(&self) -> &F {
        &self.data
    }

    pub(super) fn data_mut(&mut self) -> &mut F {
        &mut self.data
    }

    pub(super) fn path(&self) -> &Path {
        &self.path
    }
}

/// Represents the structure of the `client_secret.json` file downloaded from Google Cloud Console.
///
/// This file contains OAuth 2.0 Desktop Application credentials. The standard format from Google
/// has an "installed" wrapper around the actual credentials.
///
/// Example:
/// ```json
/// {
///   "installed": {
///     "client_id": "YOUR_CLIENT_ID.apps.googleusercontent.com",
///     "client_secret": "YOUR_CLIENT_SECRET",
///     "redirect_uris": ["http://localhost"],
///     "auth_uri": "https://accounts.google.com/o/oauth2/auth",
///     "token_uri": "https://oauth2.googleapis.com/token"
///   }
/// }
/// ```
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct SecretFile {
    installed: InstalledCredentials,
}

impl SecretFile {
    /// Loads the OAuth client credentials. A missing or malformed file is a configuration error.
    pub(crate) async fn load(path: &Path) -> Res<SecretFile> {
        if !path.is_file() {
            return Err(Error::msg(
                ErrorType::Config,
                format!("The OAuth client secret file is missing '{}'", path.display()),
            )
            .into());
        }
        utils::deserialize(path)
            .await
            .map_err(|e| Error::new(ErrorType::Config, e))
            .context("Unable to read the OAuth client secret file")
    }

    pub(super) fn client_id(&self) -> &str {
        &self.installed.client_id
    }

    pub(super) fn client_secret(&self) -> &str {
        &self.installed.client_secret
    }

    pub(super) fn auth_uri(&self) -> &str {
        &self.installed.auth_uri
    }

    pub(super) fn token_uri(&self) -> &str {
        &self.installed.token_uri
    }
}

/// The actual OAuth credentials nested within the `client_secret.json` file.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct InstalledCredentials {
    client_id: String,
    client_secret: String,

    /// Must contain `http://localhost` or `http://127.0.0.1` (without a port number)
    redirect_uris: RedirectUris,

    /// Google's OAuth authorization endpoint
    auth_uri: String,

    /// Google's OAuth token endpoint
    token_uri: String,
}

#[derive(Default, Debug, Clone)]
struct RedirectUris(Vec<String>);

impl Serialize for RedirectUris {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RedirectUris {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let vec = Vec::<String>::deserialize(deserializer)?;
        if !vec.iter().any(|s| REDIRECTS.contains(&s.as_str())) {
            return Err(D::Error::custom(format!(
                "At least one of the redirects needs to be {}, but this was not found. When \
                creating the OAuth client for a desktop app, you must include one of them",
                REDIRECTS.join(" or ")
            )));
        }
        Ok(RedirectUris(vec))
    }
}

/// This is how we save the token information that we receive from Google OAuth.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(super) struct TokenFile {
    scopes: Vec<String>,
    access_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
    id_token: Option<String>,
}

impl TokenFile {
    pub(super) async fn load(p: impl AsRef<Path>) -> Res<File<Self>> {
        let path = p.as_ref();
        if !path.is_file() {
            return Err(Error::msg(
                ErrorType::Auth,
                format!("No OAuth token found at '{}'", path.display()),
            )
            .into());
        }
        let file: File<Self> = File::load(path)
            .await
            .context("Unable to deserialize the token JSON file")?;
        file.data()
            .validate_scopes()
            .map_err(|e| Error::new(ErrorType::AuthExpired, e))?;
        Ok(file)
    }

    fn validate_scopes(&self) -> Res<()> {
        let found_scopes: HashSet<&str> = self.scopes.iter().map(|s| s.as_str()).collect();
        for &required_scope in OAUTH_SCOPES {
            if !found_scopes.contains(required_scope) {
                bail!("OAuth scope '{required_scope}' is missing.");
            }
        }
        Ok(())
    }

    pub(super) fn new(
        scopes: Vec<String>,
        access_token: String,
        refresh_token: String,
        expires_at: DateTime<Utc>,
        id_token: Option<String>,
    ) -> Self {
        Self {
            scopes,
            access_token,
            refresh_token,
            expires_at,
            id_token,
        }
    }

    pub(super) fn access_token(&self) -> &str {
        &self.access_token
    }

    pub(super) fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    pub(super) fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Check if the token is expired or will expire soon (within 5 minutes)
    pub(super) fn is_expired(&self) -> bool {
        let now = Utc::now();
        let buffer = chrono::Duration::minutes(5);
        self.expires_at <= now + buffer
    }

    /// Google only sends a new refresh token occasionally, so the old one is kept when `None`.
    pub(super) fn update(
        &mut self,
        access_token: String,
        expires_at: DateTime<Utc>,
        refresh_token: Option<String>,
    ) {
        self.access_token = access_token;
        self.expires_at = expires_at;
        if let Some(rt) = refresh_token {
            self.refresh_token = rt;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn secret_json(redirect: &str) -> String {
        format!(
            r#"
{{
    "installed": {{
        "client_id": "YOUR_CLIENT_ID.apps.googleusercontent.com",
        "client_secret": "YOUR_CLIENT_SECRET",
        "redirect_uris": ["{redirect}", "https://example.com:4040/whatever"],
        "auth_uri": "https://accounts.google.com/o/oauth2/auth",
        "token_uri": "https://oauth2.googleapis.com/token"
    }}
}}
"#
        )
    }

    #[tokio::test]
    async fn test_client_secret_good_redirect() {
        let temp_dir = TempDir::new().unwrap();
        let p = temp_dir.path().join("file.json");
        for redirect in ["http://localhost", "http://127.0.0.1"] {
            utils::write(&p, secret_json(redirect)).await.unwrap();
            let secret_file = SecretFile::load(&p).await.unwrap();
            assert_eq!(
                secret_file.client_id(),
                "YOUR_CLIENT_ID.apps.googleusercontent.com"
            );
            assert_eq!(secret_file.token_uri(), "https://oauth2.googleapis.com/token");
        }
    }

    #[tokio::test]
    async fn test_client_secret_bad_redirect() {
        let temp_dir = TempDir::new().unwrap();
        let p = temp_dir.path().join("file.json");
        utils::write(&p, secret_json("http://localhost:9900"))
            .await
            .unwrap();
        let err = SecretFile::load(&p).await.unwrap_err();
        let message = format!("{err:?}");
        assert!(message.contains("At least one of the redirects needs to be http://localhost"));
    }

    #[tokio::test]
    async fn test_client_secret_missing_is_config_error() {
        use crate::error::IntoResult;
        let temp_dir = TempDir::new().unwrap();
        let err = SecretFile::load(&temp_dir.path().join("nope.json"))
            .await
            .pub_result(ErrorType::Unknown)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorType::Config);
    }

    #[tokio::test]
    async fn test_token_file_missing_scope() {
        let json = r#"
        {
            "scopes": ["https://www.googleapis.com/auth/drive.readonly"],
            "access_token": "abc12",
            "refresh_token": "xyz89",
            "expires_at": "2025-01-01T00:00:00Z",
            "id_token": null
        }
        "#;
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("token.json");
        utils::write(&path, json).await.unwrap();

        let err = TokenFile::load(&path).await.unwrap_err();
        assert!(format!("{err:#}").contains("https://www.googleapis.com/auth/spreadsheets"));
    }

    #[tokio::test]
    async fn test_token_file_save_load_and_expiry() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("token.json");
        let token = TokenFile::new(
            OAUTH_SCOPES.iter().map(|s| s.to_string()).collect(),
            "abc12".to_string(),
            "xyz89".to_string(),
            Utc::now() + chrono::Duration::minutes(2),
            None,
        );
        File::new(&path, token).save().await.unwrap();

        let mut loaded = TokenFile::load(&path).await.unwrap();
        assert_eq!(loaded.data().refresh_token(), "xyz89");
        // Two minutes left is inside the five minute buffer.
        assert!(loaded.data().is_expired());

        loaded.data_mut().update(
            "new".to_string(),
            Utc::now() + chrono::Duration::hours(1),
            None,
        );
        assert!(!loaded.data().is_expired());
        assert_eq!(loaded.data().access_token(), "new");
        assert_eq!(loaded.data().refresh_token(), "xyz89");
    }
}
