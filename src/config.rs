//! Configuration file handling for the expense app.
//!
//! The configuration file is stored at `$EXPENSE_HOME/config.json` and contains settings such as
//! the Google Sheet URL, the row layout, the labels used in the Type column, the choice lists for
//! accounts and channels, and the paths of the credential files.

use crate::model::{Layout, TypeLabels};
use crate::{error::Res, utils};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const APP_NAME: &str = "expense";
const CONFIG_VERSION: u8 = 1;
const SECRETS: &str = ".secrets";
const CLIENT_SECRET_JSON: &str = "client_secret.json";
const SERVICE_ACCOUNT_JSON: &str = "service_account.json";
const TOKEN_JSON: &str = "token.json";
const CONFIG_JSON: &str = "config.json";
const SESSION_JSON: &str = "session.json";

/// How the app authenticates to Google.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    Eq,
    PartialEq,
    Hash,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Interactive OAuth with a desktop-app client secret. Requires `expense auth`.
    #[default]
    Oauth,
    /// A service account key. No user interaction, but the sheet must be shared with the service
    /// account's email address.
    ServiceAccount,
}

serde_plain::derive_display_from_serialize!(AuthMethod);
serde_plain::derive_fromstr_from_deserialize!(AuthMethod);

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$EXPENSE_HOME` and from there it loads `$EXPENSE_HOME/config.json`. It provides
/// paths to other items that are either configurable or are expected in a certain location within
/// the home directory.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    secrets: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    spreadsheet_id: String,
}

impl Config {
    /// Creates the data directory, its secrets subdirectory and:
    /// - Creates an initial `config.json` file using `sheet_url` along with default settings
    /// - Moves `credentials` into its default location in the secrets directory.
    ///
    /// # Arguments
    /// - `dir` - The directory that will be the root of data directory, e.g. `$HOME/expense`
    /// - `credentials` - Either the downloaded OAuth 2.0 desktop client secret or a service account
    ///   key, depending on `auth`.
    /// - `sheet_url` - The URL of the Google Sheet that holds the transactions, e.g.
    ///   https://docs.google.com/spreadsheets/d/1a7Km9FxQwRbPt82JvN4LzYpH5OcGnWsT6iDuE3VhMjX
    pub async fn create(
        dir: impl Into<PathBuf>,
        credentials: &Path,
        sheet_url: &str,
        auth: AuthMethod,
        layout: Layout,
    ) -> Res<Self> {
        let spreadsheet_id = extract_spreadsheet_id(sheet_url)
            .context("Failed to extract spreadsheet ID from sheet URL")?
            .to_string();

        // Create the directory if it does not exist
        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the expense home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let secrets = root.join(SECRETS);
        utils::make_dir(&secrets).await?;

        let config_file = ConfigFile {
            sheet_url: sheet_url.to_string(),
            layout,
            auth,
            ..ConfigFile::default()
        };
        let destination = match auth {
            AuthMethod::Oauth => config_file.client_secret_path(),
            AuthMethod::ServiceAccount => config_file.service_account_path(),
        };
        utils::rename(credentials, root.join(destination)).await?;

        let config_path = root.join(CONFIG_JSON);
        config_file.save(&config_path).await?;

        Ok(Self {
            root,
            secrets,
            config_path,
            config_file,
            spreadsheet_id,
        })
    }

    /// This will
    /// - validate that the `expense_home` exists and that the config file exists
    /// - load and validate the config file
    /// - validate that the secrets directory exists
    /// - return the loaded configuration object
    pub async fn load(expense_home: impl Into<PathBuf>) -> Res<Self> {
        let maybe_relative = expense_home.into();
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("The expense home directory is missing, run 'expense init'")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;

        let spreadsheet_id = extract_spreadsheet_id(&config_file.sheet_url)
            .context("Failed to extract spreadsheet ID from sheet URL")?
            .to_string();

        let secrets = root.join(SECRETS);
        if !secrets.is_dir() {
            bail!("The secrets directory is missing '{}'", secrets.display())
        }

        Ok(Self {
            root,
            secrets,
            config_path,
            config_file,
            spreadsheet_id,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn secrets(&self) -> &Path {
        &self.secrets
    }

    pub fn sheet_url(&self) -> &str {
        &self.config_file.sheet_url
    }

    /// The spreadsheet ID from the configured `sheet_url`. Empty if no URL is configured.
    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    /// The name of the worksheet (tab) holding transactions. `None` means the first one.
    pub fn worksheet(&self) -> Option<&str> {
        self.config_file.worksheet.as_deref()
    }

    pub fn layout(&self) -> Layout {
        self.config_file.layout
    }

    pub fn auth_method(&self) -> AuthMethod {
        self.config_file.auth
    }

    pub fn labels(&self) -> &TypeLabels {
        &self.config_file.labels
    }

    /// Allowed values for the Account field. Empty means anything is allowed.
    pub fn accounts(&self) -> &[String] {
        &self.config_file.accounts
    }

    /// Allowed values for the Channel field. Empty means anything is allowed.
    pub fn channels(&self) -> &[String] {
        &self.config_file.channels
    }

    pub fn pin(&self) -> Option<&str> {
        self.config_file.pin.as_deref()
    }

    pub fn session_path(&self) -> PathBuf {
        self.root.join(SESSION_JSON)
    }

    pub fn client_secret_path(&self) -> PathBuf {
        self.resolve(self.config_file.client_secret_path())
    }

    pub fn token_path(&self) -> PathBuf {
        self.resolve(self.config_file.token_path())
    }

    pub fn service_account_path(&self) -> PathBuf {
        self.resolve(self.config_file.service_account_path())
    }

    /// Checks if `p` is relative, and if so, resolves it against the home directory.
    fn resolve(&self, p: PathBuf) -> PathBuf {
        if p.is_absolute() {
            return p;
        }
        self.root.join(p)
    }

    #[cfg(test)]
    pub(crate) async fn update<F>(&mut self, f: F) -> Res<()>
    where
        F: FnOnce(&mut ConfigFile),
    {
        f(&mut self.config_file);
        self.config_file.save(&self.config_path).await
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "expense",
///   "config_version": 1,
///   "sheet_url": "https://docs.google.com/spreadsheets/d/7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL",
///   "worksheet": "Sheet1",
///   "layout": "full",
///   "auth": "oauth",
///   "labels": { "expense": "รายจ่าย", "income": "รายรับ" },
///   "accounts": ["Food", "Travel", "Salary"],
///   "channels": ["Cash", "Bank app"],
///   "pin": "1234"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub(crate) struct ConfigFile {
    /// Application name, should always be "expense"
    app_name: String,

    config_version: u8,

    /// URL to the Google Sheet
    pub(crate) sheet_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) worksheet: Option<String>,

    /// The layout written by `expense header` into an empty worksheet.
    #[serde(default)]
    pub(crate) layout: Layout,

    #[serde(default)]
    pub(crate) auth: AuthMethod,

    #[serde(default)]
    pub(crate) labels: TypeLabels,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) accounts: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) channels: Vec<String>,

    /// A PIN that gates the data commands. Stored in plain text; it keeps out casual use of an
    /// unattended terminal and nothing more.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) pin: Option<String>,

    /// Path to the OAuth 2.0 client credentials file (optional, relative to the home directory or
    /// absolute). Defaults to $EXPENSE_HOME/.secrets/client_secret.json
    #[serde(default, skip_serializing_if = "Option::is_none")]
    client_secret_path: Option<PathBuf>,

    /// Defaults to $EXPENSE_HOME/.secrets/token.json
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_path: Option<PathBuf>,

    /// Defaults to $EXPENSE_HOME/.secrets/service_account.json
    #[serde(default, skip_serializing_if = "Option::is_none")]
    service_account_path: Option<PathBuf>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            sheet_url: String::new(),
            worksheet: None,
            layout: Layout::default(),
            auth: AuthMethod::default(),
            labels: TypeLabels::default(),
            accounts: Vec::new(),
            channels: Vec::new(),
            pin: None,
            client_secret_path: None,
            token_path: None,
            service_account_path: None,
        }
    }
}

impl ConfigFile {
    /// Loads a ConfigFile from `path` and validates it.
    pub(crate) async fn load(path: impl AsRef<Path>) -> Res<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path).await?;
        config
            .validate()
            .with_context(|| format!("Invalid config file at {}", path.display()))?;
        Ok(config)
    }

    fn validate(&self) -> Res<()> {
        anyhow::ensure!(
            self.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            self.app_name
        );
        anyhow::ensure!(
            !self.labels.is_ambiguous(),
            "The expense and income labels must be different and not empty"
        );
        if self.pin.as_deref().is_some_and(|p| p.trim().is_empty()) {
            bail!("The pin must not be empty, remove it to disable the lock");
        }
        Ok(())
    }

    pub(crate) async fn save(&self, path: impl AsRef<Path>) -> Res<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }

    fn client_secret_path(&self) -> PathBuf {
        self.client_secret_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(SECRETS).join(CLIENT_SECRET_JSON))
    }

    fn token_path(&self) -> PathBuf {
        self.token_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(SECRETS).join(TOKEN_JSON))
    }

    fn service_account_path(&self) -> PathBuf {
        self.service_account_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(SECRETS).join(SERVICE_ACCOUNT_JSON))
    }
}

/// Extracts the spreadsheet ID from a Google Sheets URL. A bare spreadsheet ID is also accepted.
///
/// # Arguments
/// * `url` - The Google Sheets URL (e.g., "https://docs.google.com/spreadsheets/d/SPREADSHEET_ID/...")
///
/// # Returns
/// The spreadsheet ID or an error if the URL format is invalid. Returns an empty string if the URL
/// is empty.
pub(crate) fn extract_spreadsheet_id(url: &str) -> Res<&str> {
    let url = url.trim();
    if url.is_empty() {
        return Ok(url);
    }

    if url
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Ok(url);
    }

    // URL format: https://docs.google.com/spreadsheets/d/SPREADSHEET_ID/...
    // or: https://docs.google.com/spreadsheets/d/SPREADSHEET_ID?foo=bar
    let parts: Vec<&str> = url.split('/').collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == "d" && i + 1 < parts.len() {
            let id_part = parts[i + 1];
            let id = id_part
                .split('?')
                .next()
                .unwrap_or(id_part)
                .split('#')
                .next()
                .unwrap_or(id_part);
            if id.is_empty() {
                break;
            }
            return Ok(id);
        }
    }
    Err(anyhow::anyhow!(
        "Invalid Google Sheets URL format. Expected: https://docs.google.com/spreadsheets/d/SPREADSHEET_ID"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_config_create() {
        let dir = TempDir::new().unwrap();
        let home_dir = dir.path().join("expense_home");
        let secret_source_file = dir.path().join("x.txt");
        let secret_content = "12345";
        let sheet_url = "https://docs.google.com/spreadsheets/d/7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL/edit";
        utils::write(&secret_source_file, secret_content)
            .await
            .unwrap();

        let config = Config::create(
            &home_dir,
            &secret_source_file,
            sheet_url,
            AuthMethod::Oauth,
            Layout::Basic,
        )
        .await
        .unwrap();

        assert_eq!(sheet_url, config.sheet_url());
        assert_eq!(
            "7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL",
            config.spreadsheet_id()
        );
        assert_eq!(config.layout(), Layout::Basic);

        let found_secret_content = utils::read(&config.client_secret_path()).await.unwrap();
        assert_eq!(secret_content, found_secret_content);
        assert!(!secret_source_file.exists());
        assert!(config.secrets().is_dir());

        let loaded = Config::load(&home_dir).await.unwrap();
        assert_eq!(loaded.spreadsheet_id(), config.spreadsheet_id());
        assert_eq!(loaded.layout(), Layout::Basic);
    }

    #[tokio::test]
    async fn test_config_create_service_account() {
        let dir = TempDir::new().unwrap();
        let key = dir.path().join("key.json");
        utils::write(&key, "{}").await.unwrap();
        let config = Config::create(
            dir.path().join("home"),
            &key,
            "MySheetIDX",
            AuthMethod::ServiceAccount,
            Layout::Full,
        )
        .await
        .unwrap();
        assert!(config.service_account_path().is_file());
        assert!(!config.client_secret_path().exists());
        assert_eq!("MySheetIDX", config.spreadsheet_id());
    }

    #[tokio::test]
    async fn test_config_create_bad_url_leaves_credentials() {
        let dir = TempDir::new().unwrap();
        let key = dir.path().join("key.json");
        utils::write(&key, "{}").await.unwrap();
        let result = Config::create(
            dir.path().join("home"),
            &key,
            "https://example.com/invalid",
            AuthMethod::Oauth,
            Layout::Full,
        )
        .await;
        assert!(result.is_err());
        assert!(key.is_file());
    }

    #[tokio::test]
    async fn test_load_missing_home() {
        let dir = TempDir::new().unwrap();
        let result = Config::load(dir.path().join("nope")).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_config_file_default() {
        let config = ConfigFile::default();
        assert_eq!(config.sheet_url, "");
        assert_eq!(config.layout, Layout::Full);
        assert_eq!(config.auth, AuthMethod::Oauth);
        assert_eq!(
            config.client_secret_path(),
            PathBuf::from(SECRETS).join(CLIENT_SECRET_JSON)
        );
        assert_eq!(config.token_path(), PathBuf::from(SECRETS).join(TOKEN_JSON));
    }

    #[tokio::test]
    async fn test_config_file_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let original = ConfigFile {
            sheet_url: "https://docs.google.com/spreadsheets/d/test123".to_string(),
            worksheet: Some("Sheet1".to_string()),
            labels: TypeLabels::new("รายจ่าย", "รายรับ"),
            accounts: vec!["Food".to_string(), "Travel".to_string()],
            pin: Some("1234".to_string()),
            token_path: Some(PathBuf::from("/tmp/my_token.json")),
            ..ConfigFile::default()
        };
        original.save(&config_path).await.unwrap();
        let loaded = ConfigFile::load(&config_path).await.unwrap();
        assert_eq!(original, loaded);
    }

    #[tokio::test]
    async fn test_config_file_load_with_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let json = r#"{
            "app_name": "expense",
            "config_version": 1,
            "sheet_url": "https://docs.google.com/spreadsheets/d/minimal"
        }"#;
        utils::write(&config_path, json).await.unwrap();

        let config = ConfigFile::load(&config_path).await.unwrap();
        assert_eq!(config.layout, Layout::Full);
        assert_eq!(config.labels, TypeLabels::default());
        assert!(config.accounts.is_empty());
        assert_eq!(config.pin, None);
        assert_eq!(
            config.service_account_path(),
            PathBuf::from(SECRETS).join(SERVICE_ACCOUNT_JSON)
        );
    }

    #[tokio::test]
    async fn test_config_file_load_invalid_app_name() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let json = r#"{
            "app_name": "wrong_app",
            "config_version": 1,
            "sheet_url": "https://docs.google.com/spreadsheets/d/test"
        }"#;
        utils::write(&config_path, json).await.unwrap();

        let err = ConfigFile::load(&config_path).await.unwrap_err();
        assert!(format!("{err:#}").contains("Invalid app_name"));
    }

    #[tokio::test]
    async fn test_config_file_load_ambiguous_labels() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let json = r#"{
            "app_name": "expense",
            "config_version": 1,
            "sheet_url": "",
            "labels": { "expense": "x", "income": "x" }
        }"#;
        utils::write(&config_path, json).await.unwrap();
        assert!(ConfigFile::load(&config_path).await.is_err());
    }

    #[test]
    fn test_config_file_serialization_omits_none_fields() {
        let json = serde_json::to_string(&ConfigFile::default()).unwrap();
        assert!(!json.contains("client_secret_path"));
        assert!(!json.contains("token_path"));
        assert!(!json.contains("pin"));
        assert!(!json.contains("accounts"));
    }

    #[test]
    fn test_extract_spreadsheet_id() {
        let url = "https://docs.google.com/spreadsheets/d/7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL/edit";
        let id = extract_spreadsheet_id(url).unwrap();
        assert_eq!(id, "7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL");

        let url = "https://docs.google.com/spreadsheets/d/7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL?foo=bar";
        let id = extract_spreadsheet_id(url).unwrap();
        assert_eq!(id, "7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL");

        let url = "https://docs.google.com/spreadsheets/d/ABC123#gid=0";
        assert_eq!(extract_spreadsheet_id(url).unwrap(), "ABC123");

        assert_eq!(extract_spreadsheet_id(" ABC-123_x ").unwrap(), "ABC-123_x");
        assert_eq!(extract_spreadsheet_id("").unwrap(), "");

        assert!(extract_spreadsheet_id("https://example.com/invalid").is_err());
        assert!(extract_spreadsheet_id("https://docs.google.com/spreadsheets/d/").is_err());
        assert!(extract_spreadsheet_id("not a url").is_err());
    }
}
