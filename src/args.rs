//! These structs provide the CLI interface for the expense CLI.

use crate::config::AuthMethod;
use crate::model::{Amount, GroupBy, Layout, Period, TransactionType};
use crate::report::Format;
use chrono::{NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing::level_filters::LevelFilter;

/// expense: record income and expenses to a Google Sheet and summarize them.
///
/// Each transaction is appended as one row of a worksheet whose first row holds the column
/// headers. Summaries are computed from whatever rows the worksheet holds, so rows typed into the
/// sheet by hand are included too.
///
/// You will need a Google Cloud OAuth client (desktop app) or a service account key, and a Google
/// Sheet that the account can edit.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory and initialize the configuration files.
    ///
    /// This is the first command you should run. You need two things ready beforehand:
    ///
    /// - The URL of your Google Sheet, passed as --sheet-url.
    ///
    /// - The downloaded OAuth client secret (or service account key with --auth
    ///   service-account), passed as --credentials. It is moved into $EXPENSE_HOME/.secrets.
    Init(InitArgs),
    /// Sign in to Google.
    Auth(AuthArgs),
    /// Show or change the spreadsheet used by this session.
    Sheet(SheetArgs),
    /// Write the header row into an empty worksheet, or check the existing one.
    Header,
    /// Record one income or expense.
    Add(AddArgs),
    /// Show the most recent transactions, newest first.
    Recent(RecentArgs),
    /// Show total income, expense and balance, and the totals of each day, week, month or year.
    Summary(SummaryArgs),
    /// Show totals per account, channel, source or destination.
    Breakdown(BreakdownArgs),
    /// Lock the session. Data commands fail until it is unlocked with the PIN.
    Lock,
    /// Unlock the session.
    Unlock(UnlockArgs),
    /// End the session and remove the saved OAuth tokens.
    Logout,
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where configuration and credentials are held. Defaults to ~/expense
    #[arg(long, env = "EXPENSE_HOME", default_value_t = default_expense_home())]
    expense_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, expense_home: PathBuf) -> Self {
        Self {
            log_level,
            expense_home: expense_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn expense_home(&self) -> &DisplayPath {
        &self.expense_home
    }
}

/// (Not shown): Args for the `expense init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The URL to your Google sheet. It looks like this:
    /// https://docs.google.com/spreadsheets/d/1a7Km9FxQwRbPt82JvN4LzYpH5OcGnWsT6iDuE3VhMjX
    #[arg(long, default_value = "")]
    sheet_url: String,

    /// The path to your downloaded credentials. This file will be moved to the default secrets
    /// location in the main data directory.
    #[arg(long)]
    credentials: PathBuf,

    /// How to authenticate to Google.
    #[arg(long, value_enum, default_value_t = AuthMethod::Oauth)]
    auth: AuthMethod,

    /// The header row that `expense header` writes into an empty worksheet.
    #[arg(long, value_enum, default_value_t = Layout::Full)]
    layout: Layout,
}

impl InitArgs {
    pub fn new(
        sheet_url: impl Into<String>,
        credentials: impl Into<PathBuf>,
        auth: AuthMethod,
        layout: Layout,
    ) -> Self {
        Self {
            sheet_url: sheet_url.into(),
            credentials: credentials.into(),
            auth,
            layout,
        }
    }

    pub fn sheet_url(&self) -> &str {
        &self.sheet_url
    }

    pub fn credentials(&self) -> &Path {
        &self.credentials
    }

    pub fn auth(&self) -> AuthMethod {
        self.auth
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }
}

/// (Not shown): Args for the `expense auth` command.
#[derive(Debug, Parser, Clone)]
pub struct AuthArgs {
    /// Verify and refresh authentication.
    #[arg(long)]
    verify: bool,
}

impl AuthArgs {
    pub fn new(verify: bool) -> Self {
        Self { verify }
    }

    pub fn verify(&self) -> bool {
        self.verify
    }
}

/// (Not shown): Args for the `expense sheet` command.
#[derive(Debug, Parser, Clone)]
pub struct SheetArgs {
    #[command(subcommand)]
    action: Option<SheetAction>,
}

impl SheetArgs {
    pub fn new(action: Option<SheetAction>) -> Self {
        Self { action }
    }

    /// `None` means show.
    pub fn action(&self) -> Option<&SheetAction> {
        self.action.as_ref()
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum SheetAction {
    /// Show the spreadsheet in use.
    Show,
    /// Use a different spreadsheet for this session. The sheet must be readable.
    Set {
        /// A Google Sheets link or a bare spreadsheet ID.
        url: String,
    },
    /// Go back to the spreadsheet in config.json.
    Clear,
}

/// (Not shown): Args for the `expense add` command.
#[derive(Debug, Parser, Clone)]
pub struct AddArgs {
    /// Whether this is an income or an expense.
    #[arg(value_enum)]
    kind: TransactionType,

    /// The amount, zero or more. Separators and a currency symbol are allowed, e.g. "฿1,250.50".
    #[arg(value_parser = parse_amount, allow_negative_numbers = true)]
    amount: Amount,

    /// The account or category, e.g. "Food". Must be one of the configured accounts, if any.
    #[arg(long, default_value = "")]
    account: String,

    /// Where the money came from.
    #[arg(long, default_value = "")]
    source: String,

    /// Where the money went.
    #[arg(long, default_value = "")]
    destination: String,

    /// How it was paid, e.g. "Cash". Must be one of the configured channels, if any.
    #[arg(long, default_value = "")]
    channel: String,

    #[arg(long, default_value = "")]
    note: String,

    /// YYYY-MM-DD. Defaults to today.
    #[arg(long)]
    date: Option<NaiveDate>,

    /// HH:MM:SS. Defaults to now.
    #[arg(long)]
    time: Option<NaiveTime>,
}

impl AddArgs {
    pub fn new(kind: TransactionType, amount: Amount) -> Self {
        Self {
            kind,
            amount,
            account: String::new(),
            source: String::new(),
            destination: String::new(),
            channel: String::new(),
            note: String::new(),
            date: None,
            time: None,
        }
    }

    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = account.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = destination.into();
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_time(mut self, time: NaiveTime) -> Self {
        self.time = Some(time);
        self
    }

    pub fn kind(&self) -> TransactionType {
        self.kind
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn note(&self) -> &str {
        &self.note
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn time(&self) -> Option<NaiveTime> {
        self.time
    }
}

/// (Not shown): Args for the `expense recent` command.
#[derive(Debug, Parser, Clone)]
pub struct RecentArgs {
    /// How many transactions to show.
    #[arg(long, short = 'n', default_value_t = crate::commands::DEFAULT_RECENT)]
    count: usize,

    #[arg(long, value_enum, default_value_t = Format::Table)]
    format: Format,
}

impl RecentArgs {
    pub fn new(count: usize, format: Format) -> Self {
        Self { count, format }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn format(&self) -> Format {
        self.format
    }
}

/// (Not shown): Args for the `expense summary` command.
#[derive(Debug, Parser, Clone)]
pub struct SummaryArgs {
    /// The size of each bucket.
    #[arg(long, value_enum, default_value_t = Period::Month)]
    period: Period,

    #[arg(long, value_enum, default_value_t = Format::Table)]
    format: Format,

    /// Only show this many of the most recent buckets. The headline totals still cover every row.
    #[arg(long)]
    limit: Option<usize>,
}

impl SummaryArgs {
    pub fn new(period: Period, format: Format, limit: Option<usize>) -> Self {
        Self {
            period,
            format,
            limit,
        }
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }
}

/// (Not shown): Args for the `expense breakdown` command.
#[derive(Debug, Parser, Clone)]
pub struct BreakdownArgs {
    /// The field to group by.
    #[arg(long, value_enum, default_value_t = GroupBy::Account)]
    by: GroupBy,

    #[arg(long, value_enum, default_value_t = Format::Table)]
    format: Format,
}

impl BreakdownArgs {
    pub fn new(by: GroupBy, format: Format) -> Self {
        Self { by, format }
    }

    pub fn by(&self) -> GroupBy {
        self.by
    }

    pub fn format(&self) -> Format {
        self.format
    }
}

/// (Not shown): Args for the `expense unlock` command.
#[derive(Debug, Parser, Clone)]
pub struct UnlockArgs {
    #[arg(long, env = "EXPENSE_PIN", hide_env_values = true)]
    pin: String,
}

impl UnlockArgs {
    pub fn new(pin: impl Into<String>) -> Self {
        Self { pin: pin.into() }
    }

    pub fn pin(&self) -> &str {
        &self.pin
    }
}

fn default_expense_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("expense"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --expense-home or EXPENSE_HOME instead of relying on the \
                default expense home directory. If you continue using the program right now, you \
                may have problems!",
            );
            PathBuf::from("expense")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn path(&self) -> &Path {
        &self.0
    }
}

/// An empty cell in the sheet reads as zero, but on the command line an amount must be given.
fn parse_amount(s: &str) -> Result<Amount, String> {
    if s.trim().is_empty() {
        return Err(String::from("an amount is required"));
    }
    Amount::from_str(s).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_add() {
        let args = Args::try_parse_from([
            "expense",
            "--expense-home",
            "/tmp/e",
            "add",
            "expense",
            "฿1,250.50",
            "--account",
            "Food",
            "--date",
            "2025-03-10",
        ])
        .unwrap();
        assert_eq!(args.common().expense_home().path(), Path::new("/tmp/e"));
        let Command::Add(add) = args.command() else {
            panic!("expected add, got {:?}", args.command());
        };
        assert_eq!(add.kind(), TransactionType::Expense);
        assert_eq!(add.amount().to_string(), "฿1,250.50");
        assert_eq!(add.account(), "Food");
        assert_eq!(add.date(), NaiveDate::from_ymd_opt(2025, 3, 10));
        assert_eq!(add.time(), None);
    }

    #[test]
    fn test_parse_add_amounts() {
        let parse = |amount: &str| Args::try_parse_from(["expense", "add", "expense", amount]);
        let args = parse("-5").unwrap();
        let Command::Add(add) = args.command() else {
            panic!("expected add, got {:?}", args.command());
        };
        assert!(add.amount().is_negative());
        assert!(parse("").is_err());
        assert!(parse("  ").is_err());
        assert!(parse("five").is_err());
    }

    #[test]
    fn test_parse_summary_defaults() {
        let args = Args::try_parse_from(["expense", "summary"]).unwrap();
        let Command::Summary(summary) = args.command() else {
            panic!("expected summary");
        };
        assert_eq!(summary.period(), Period::Month);
        assert_eq!(summary.format(), Format::Table);
        assert_eq!(summary.limit(), None);
    }

    #[test]
    fn test_parse_sheet_set() {
        let args = Args::try_parse_from(["expense", "sheet", "set", "abc123"]).unwrap();
        let Command::Sheet(sheet) = args.command() else {
            panic!("expected sheet");
        };
        assert!(matches!(sheet.action(), Some(SheetAction::Set { url }) if url == "abc123"));
    }
}
