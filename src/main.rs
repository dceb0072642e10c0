use clap::Parser;
use expense_sheet::args::{Args, Command, SheetAction};
use expense_sheet::{commands, Config, ErrorType, IntoResult, Mode, Result, Session};
use std::path::Path;
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e}");
            if let Some(recovery) = e.kind().recovery() {
                error!("{recovery}");
            }
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().expense_home().path();

    // This allows for testing the program without hitting the Google APIs. When
    // EXPENSE_SHEET_IN_TEST_MODE is set and non-zero in length, then the mode will be Mode::Test,
    // otherwise it will be Mode::Google.
    let mode = Mode::from_env();

    // Route to appropriate command handler
    let _: () = match args.command() {
        Command::Init(init_args) => commands::init(
            home,
            init_args.credentials(),
            init_args.sheet_url(),
            init_args.auth(),
            init_args.layout(),
        )
        .await?
        .print(),

        Command::Auth(auth_args) => {
            let config = load_config(home).await?;
            if auth_args.verify() {
                commands::auth_verify(&config).await?.print()
            } else {
                commands::auth(&config).await?.print()
            }
        }

        Command::Sheet(sheet_args) => {
            let mut session = open_session(home, mode).await?;
            match sheet_args.action() {
                None | Some(SheetAction::Show) => commands::sheet_show(&session).await?.print(),
                Some(SheetAction::Set { url }) => {
                    commands::sheet_set(&mut session, url).await?.print()
                }
                Some(SheetAction::Clear) => commands::sheet_clear(&mut session).await?.print(),
            }
        }

        Command::Header => commands::header(&open_session(home, mode).await?)
            .await?
            .print(),

        Command::Add(add_args) => commands::add(&open_session(home, mode).await?, add_args)
            .await?
            .print(),

        Command::Recent(recent_args) => commands::recent(
            &open_session(home, mode).await?,
            recent_args.count(),
            recent_args.format(),
        )
        .await?
        .print(),

        Command::Summary(summary_args) => commands::summary(
            &open_session(home, mode).await?,
            summary_args.period(),
            summary_args.format(),
            summary_args.limit(),
        )
        .await?
        .print(),

        Command::Breakdown(breakdown_args) => commands::breakdown(
            &open_session(home, mode).await?,
            breakdown_args.by(),
            breakdown_args.format(),
        )
        .await?
        .print(),

        Command::Lock => commands::lock(&mut open_session(home, mode).await?)
            .await?
            .print(),

        Command::Unlock(unlock_args) => {
            commands::unlock(&mut open_session(home, mode).await?, unlock_args.pin())
                .await?
                .print()
        }

        Command::Logout => commands::logout(open_session(home, mode).await?)
            .await?
            .print(),
    };
    Ok(())
}

async fn load_config(home: &Path) -> Result<Config> {
    Config::load(home).await.pub_result(ErrorType::Config)
}

async fn open_session(home: &Path, mode: Mode) -> Result<Session> {
    Session::open(load_config(home).await?, mode).await
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use default log level for this crate only.
            EnvFilter::new(format!(
                "{}={},{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                level,
                env!("CARGO_BIN_NAME"),
                level
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
