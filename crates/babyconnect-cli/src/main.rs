//! CLI entry point for BabyConnect.
//!
//! The `babyconnect` binary opens (and migrates) the local database, then
//! runs one subcommand against the core crates: account and session
//! management, pregnancy tracking, the community feed, backups, and the
//! metered AI features.

mod app;
mod commands;
mod config;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::app::App;
use crate::config::CliConfig;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// BabyConnect: pregnancy companion with a community feed.
#[derive(Parser)]
#[command(name = "babyconnect", version, about = "BabyConnect pregnancy companion")]
struct Cli {
    /// Configuration file (default: ./babyconnect.toml if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file; overrides config and BABYCONNECT_DB.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show database, remote, session and quota state.
    Status,

    /// Apply pending migrations and report what ran.
    Migrate,

    /// Export or import a full backup.
    #[command(subcommand)]
    Backup(BackupCommand),

    /// Local accounts and sessions.
    #[command(subcommand)]
    Account(AccountCommand),

    /// Today's AI usage.
    Quota,

    /// The shopping checklist.
    #[command(subcommand)]
    Checklist(ChecklistCommand),

    /// Pregnancy tracking: due date, weekly tasks, journal, timers.
    #[command(subcommand)]
    Track(TrackCommand),

    /// The community feed.
    #[command(subcommand)]
    Posts(PostsCommand),

    /// Hosted backend account.
    #[command(subcommand)]
    Remote(RemoteCommand),

    /// AI features (counted against the daily quota).
    #[command(subcommand)]
    Ai(AiCommand),
}

#[derive(Subcommand)]
enum BackupCommand {
    /// Write every recognized record to a JSON file.
    Export { path: PathBuf },
    /// Restore records from a JSON backup file.
    Import { path: PathBuf },
}

#[derive(Subcommand)]
enum AccountCommand {
    Register(Credentials),
    Login(Credentials),
    Logout,
    /// Show the signed-in user.
    Whoami,
}

#[derive(Args)]
struct Credentials {
    username: String,
    password: String,
}

#[derive(Subcommand)]
enum ChecklistCommand {
    /// List items with their checked state.
    List,
    /// Check or uncheck an item.
    Toggle { id: String },
}

#[derive(Subcommand)]
enum TrackCommand {
    /// Set the due date (YYYY-MM-DD), or clear it with no argument.
    DueDate { date: Option<chrono::NaiveDate> },
    /// Show this week's content.
    Week {
        /// Week to show instead of the current one.
        #[arg(long)]
        week: Option<u8>,
    },
    /// Mark or unmark a weekly task.
    Task { week: u8, index: usize },
    /// Add a journal entry.
    Journal {
        #[arg(long, value_parser = commands::parse_mood)]
        mood: babyconnect_store::models::Mood,
        text: String,
    },
    /// Record a kick counting session.
    Kicks { duration_secs: u64, count: u32 },
    /// Start a contraction.
    ContractionStart,
    /// Finish the contraction in progress.
    ContractionStop,
}

#[derive(Subcommand)]
enum PostsCommand {
    List,
    Create {
        text: String,
        /// Image URL to attach.
        #[arg(long, conflicts_with = "image_file")]
        image: Option<String>,
        /// Local image to upload to the backend and attach.
        #[arg(long)]
        image_file: Option<PathBuf>,
    },
    Delete { id: String },
    Like { id: String },
    Comment { id: String, text: String },
}

#[derive(Subcommand)]
enum RemoteCommand {
    SignUp {
        email: String,
        password: String,
        username: String,
    },
    SignIn { email: String, password: String },
    SignOut,
    /// Push the local profile fields to the backend.
    SyncProfile,
}

#[derive(Subcommand)]
enum AiCommand {
    /// Ask the doula assistant a question.
    Ask { message: String },
    /// Meaning and origin of a baby name.
    Name {
        name: String,
        /// Add the result to the favorites list.
        #[arg(long)]
        favorite: bool,
    },
    /// Draft content for a week.
    Week {
        week: u8,
        /// Save the draft into the week catalog.
        #[arg(long)]
        apply: bool,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing("info", cli.json_logs);

    let mut config = CliConfig::load(cli.config.as_deref())?;
    config.apply_env(|name| std::env::var(name).ok());
    if let Some(db) = cli.db {
        config.storage.path = db;
    }
    let app = App::open(config)?;

    match cli.command {
        Commands::Status => commands::status(&app).await,
        Commands::Migrate => commands::migrate(&app),
        Commands::Backup(BackupCommand::Export { path }) => commands::backup_export(&app, &path),
        Commands::Backup(BackupCommand::Import { path }) => commands::backup_import(&app, &path),
        Commands::Account(cmd) => match cmd {
            AccountCommand::Register(c) => commands::register(&app, &c.username, &c.password),
            AccountCommand::Login(c) => commands::login(&app, &c.username, &c.password),
            AccountCommand::Logout => commands::logout(&app),
            AccountCommand::Whoami => commands::whoami(&app),
        },
        Commands::Quota => commands::quota(&app),
        Commands::Checklist(ChecklistCommand::List) => commands::checklist_list(&app),
        Commands::Checklist(ChecklistCommand::Toggle { id }) => {
            commands::checklist_toggle(&app, &id).await
        }
        Commands::Track(cmd) => match cmd {
            TrackCommand::DueDate { date } => commands::due_date(&app, date).await,
            TrackCommand::Week { week } => commands::week(&app, week),
            TrackCommand::Task { week, index } => commands::weekly_task(&app, week, index).await,
            TrackCommand::Journal { mood, text } => commands::journal(&app, &text, mood).await,
            TrackCommand::Kicks {
                duration_secs,
                count,
            } => commands::kicks(&app, duration_secs, count).await,
            TrackCommand::ContractionStart => commands::contraction_start(&app).await,
            TrackCommand::ContractionStop => commands::contraction_stop(&app).await,
        },
        Commands::Posts(cmd) => match cmd {
            PostsCommand::List => commands::posts_list(&app).await,
            PostsCommand::Create {
                text,
                image,
                image_file,
            } => commands::post_create(&app, text, image, image_file.as_deref()).await,
            PostsCommand::Delete { id } => commands::post_delete(&app, &id).await,
            PostsCommand::Like { id } => commands::post_like(&app, &id).await,
            PostsCommand::Comment { id, text } => commands::post_comment(&app, &id, &text).await,
        },
        Commands::Remote(cmd) => match cmd {
            RemoteCommand::SignUp {
                email,
                password,
                username,
            } => commands::remote_sign_up(&app, &email, &password, &username).await,
            RemoteCommand::SignIn { email, password } => {
                commands::remote_sign_in(&app, &email, &password).await
            }
            RemoteCommand::SignOut => commands::remote_sign_out(&app).await,
            RemoteCommand::SyncProfile => commands::sync_profile(&app).await,
        },
        Commands::Ai(cmd) => match cmd {
            AiCommand::Ask { message } => commands::ai_ask(&app, &message).await,
            AiCommand::Name { name, favorite } => commands::ai_name(&app, &name, favorite).await,
            AiCommand::Week { week, apply } => commands::ai_week(&app, week, apply).await,
        },
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Install the tracing subscriber on stderr, so command output on stdout
/// stays clean. `RUST_LOG` overrides `default_level`.
fn init_tracing(default_level: &str, json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}
