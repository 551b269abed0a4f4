//! Subcommand handlers.
//!
//! Each handler prints its result on stdout and returns `anyhow::Result`.
//! Settings changes go through the local store first and are then handed to
//! the sync coordinator, which mirrors them when a remote session exists.

use std::path::Path;

use anyhow::{Context, Result, bail};
use babyconnect_ai::{AiOutcome, ChatTurn};
use babyconnect_store::models::{Mood, Post};
use babyconnect_store::settings::weekly_task_key;
use babyconnect_store::{backup, migration};
use babyconnect_sync::{PostDraft, SyncCoordinator, SyncMode};
use serde::Serialize;
use tracing::{info, warn};

use crate::app::App;

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Clap value parser for journal moods.
pub fn parse_mood(value: &str) -> Result<Mood, String> {
    serde_json::from_value(serde_json::Value::String(value.to_lowercase()))
        .map_err(|_| "expected one of: happy, tired, anxious, excited, sick".to_string())
}

// ---------------------------------------------------------------------------
// Status and maintenance
// ---------------------------------------------------------------------------

pub async fn status(app: &App) -> Result<()> {
    let sync = app.sync()?;
    let mode = match sync.mode() {
        SyncMode::LocalOnly => "local-only",
        SyncMode::Hybrid => "hybrid",
    };
    println!();
    println!("  BabyConnect Status");
    println!("  ==================");
    println!();
    println!("  Database:         {}", app.config.storage.path.display());
    println!(
        "  Schema version:   {} (latest {})",
        migration::current_version(&app.store),
        migration::latest_version()
    );
    println!("  Sync mode:        {mode}");
    match sync.remote_session() {
        Some(s) => println!("  Remote account:   {}", s.email.unwrap_or(s.user_id)),
        None => println!("  Remote account:   not signed in"),
    }
    match app.sessions()?.get_session() {
        Some(s) => println!("  Local session:    {}", s.username),
        None => println!("  Local session:    none"),
    }
    match app.settings().current_week() {
        Some(week) => println!("  Current week:     {week}"),
        None => println!("  Current week:     no due date"),
    }
    println!("  AI quota:         {}", app.quota().check_status());
    println!();
    Ok(())
}

pub fn migrate(app: &App) -> Result<()> {
    let report = &app.migration;
    if report.applied.is_empty() {
        println!("Up to date at version {}.", report.to);
    } else {
        println!(
            "Migrated {} -> {}: {}",
            report.from,
            report.to,
            report.applied.join(", ")
        );
    }
    Ok(())
}

pub fn backup_export(app: &App, path: &Path) -> Result<()> {
    backup::export_to_file(&app.store, path)
        .with_context(|| format!("failed to export backup to {}", path.display()))?;
    println!("Backup written to {}.", path.display());
    Ok(())
}

pub fn backup_import(app: &App, path: &Path) -> Result<()> {
    let restored = backup::import_from_file(&app.store, path)
        .with_context(|| format!("failed to import backup from {}", path.display()))?;
    println!("Restored {restored} records from {}.", path.display());
    Ok(())
}

pub fn quota(app: &App) -> Result<()> {
    print_json(&app.quota().check_status())
}

// ---------------------------------------------------------------------------
// Local accounts
// ---------------------------------------------------------------------------

pub fn register(app: &App, username: &str, password: &str) -> Result<()> {
    let session = app.sessions()?.register(username, password)?;
    println!("Registered and signed in as {}.", session.username);
    Ok(())
}

pub fn login(app: &App, username: &str, password: &str) -> Result<()> {
    let session = app.sessions()?.login(username, password)?;
    println!("Signed in as {}.", session.username);
    Ok(())
}

pub fn logout(app: &App) -> Result<()> {
    app.sessions()?.logout()?;
    println!("Signed out.");
    Ok(())
}

pub fn whoami(app: &App) -> Result<()> {
    match app.sessions()?.current_user() {
        Some(user) => println!("{}", user.username),
        None => println!("Not signed in."),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tracking
// ---------------------------------------------------------------------------

/// Hand the current settings to the coordinator and wait for the mirror.
async fn push_settings(app: &App) -> Result<()> {
    let sync = app.sync()?;
    sync.save_settings(&app.settings().get())?;
    sync.flush().await;
    Ok(())
}

pub fn checklist_list(app: &App) -> Result<()> {
    let checked = app.settings().get().checklist_progress;
    for item in app.catalog().checklist_definitions() {
        let mark = if checked.contains(&item.id) { "x" } else { " " };
        println!("[{mark}] {:>4}  {}", item.id, item.name);
    }
    Ok(())
}

pub async fn checklist_toggle(app: &App, id: &str) -> Result<()> {
    if !app
        .catalog()
        .checklist_definitions()
        .iter()
        .any(|item| item.id == id)
    {
        bail!("no checklist item with id {id}");
    }
    let checked = app.settings().toggle_checklist_item(id)?;
    push_settings(app).await?;
    println!("{id}: {}", if checked { "checked" } else { "unchecked" });
    Ok(())
}

pub async fn due_date(app: &App, date: Option<chrono::NaiveDate>) -> Result<()> {
    let settings = app.settings();
    settings.set_due_date(date)?;
    push_settings(app).await?;
    match (date, settings.current_week()) {
        (Some(d), Some(week)) => println!("Due date set to {d}; this is week {week}."),
        (Some(d), None) => println!("Due date set to {d}; outside the 42-week range today."),
        (None, _) => println!("Due date cleared."),
    }
    Ok(())
}

pub fn week(app: &App, week: Option<u8>) -> Result<()> {
    let week = match week.or_else(|| app.settings().current_week()) {
        Some(w) => w,
        None => bail!("no due date set; pass --week"),
    };
    let info = app
        .catalog()
        .week(week)
        .with_context(|| format!("no content for week {week}"))?;
    let done = app.settings().get().weekly_tasks_completed;

    println!("Week {}: {}", info.week, info.baby_size);
    println!();
    println!("{}", info.development);
    for (label, text) in [
        ("Body", &info.body_changes),
        ("Symptoms", &info.symptoms),
        ("Tip", &info.tips),
    ] {
        if !text.is_empty() {
            println!("{label}: {text}");
        }
    }
    if !info.weekly_checklist.is_empty() {
        println!();
        for (index, task) in info.weekly_checklist.iter().enumerate() {
            let mark = if done.contains(&weekly_task_key(week, index)) {
                "x"
            } else {
                " "
            };
            println!("[{mark}] {index}. {task}");
        }
    }
    Ok(())
}

pub async fn weekly_task(app: &App, week: u8, index: usize) -> Result<()> {
    let done = app
        .settings()
        .toggle_weekly_task(&weekly_task_key(week, index))?;
    push_settings(app).await?;
    println!(
        "Week {week} task {index}: {}",
        if done { "done" } else { "not done" }
    );
    Ok(())
}

pub async fn journal(app: &App, text: &str, mood: Mood) -> Result<()> {
    let entry = app.settings().add_journal_entry(text, mood)?;
    push_settings(app).await?;
    print_json(&entry)
}

pub async fn kicks(app: &App, duration_secs: u64, count: u32) -> Result<()> {
    let session = app.settings().record_kick_session(duration_secs, count)?;
    push_settings(app).await?;
    print_json(&session)
}

pub async fn contraction_start(app: &App) -> Result<()> {
    app.settings().start_contraction()?;
    push_settings(app).await?;
    println!("Contraction started.");
    Ok(())
}

pub async fn contraction_stop(app: &App) -> Result<()> {
    let contraction = app.settings().finish_contraction()?;
    push_settings(app).await?;
    print_json(&contraction)
}

// ---------------------------------------------------------------------------
// Feed
// ---------------------------------------------------------------------------

/// Who is acting on the feed: the remote user in hybrid mode, the local
/// account otherwise. Returns `(identity, display name)`.
fn feed_identity(app: &App, sync: &SyncCoordinator) -> Result<(String, String)> {
    let local_name = app.settings().get().user_name;
    match sync.mode() {
        SyncMode::Hybrid => {
            let session = sync
                .remote_session()
                .context("sign in first: babyconnect remote sign-in")?;
            let name = local_name
                .or(session.username)
                .or(session.email)
                .unwrap_or_else(|| session.user_id.clone());
            Ok((session.user_id, name))
        }
        SyncMode::LocalOnly => {
            let session = app
                .sessions()?
                .get_session()
                .context("sign in first: babyconnect account login")?;
            let name = local_name.unwrap_or_else(|| session.username.clone());
            Ok((session.username, name))
        }
    }
}

fn print_post(post: &Post) {
    let week = if post.author_week > 0 {
        format!(" (week {})", post.author_week)
    } else {
        String::new()
    };
    println!("{}  {}{}", post.id, post.author_name, week);
    println!("    {}", post.content);
    println!(
        "    {} likes{}, {} comments",
        post.likes,
        if post.liked_by_me { " (you)" } else { "" },
        post.comments.len()
    );
    for comment in &post.comments {
        println!("      - {}: {}", comment.author_name, comment.text);
    }
}

pub async fn posts_list(app: &App) -> Result<()> {
    let posts = app.sync()?.list_posts().await;
    if posts.is_empty() {
        println!("No posts yet.");
    }
    for post in &posts {
        print_post(post);
    }
    Ok(())
}

pub async fn post_create(
    app: &App,
    text: String,
    image: Option<String>,
    image_file: Option<&Path>,
) -> Result<()> {
    let sync = app.sync()?;
    if image_file.is_some() && sync.mode() == SyncMode::LocalOnly {
        bail!("--image-file needs a configured remote; use --image <url> instead");
    }
    let (identity, author_name) = feed_identity(app, &sync)?;
    let image = match image_file {
        Some(path) => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            let url = sync.upload_image(name, bytes).await;
            if url.is_none() {
                warn!(path = %path.display(), "image upload failed, posting without it");
            }
            url
        }
        None => image,
    };
    let settings = app.settings();
    let draft = PostDraft {
        author_name,
        author_week: settings.current_week().map(u32::from).unwrap_or(0),
        author_photo: settings.get().user_photo,
        content: text,
        image,
    };
    let post = sync.create_post(&identity, draft).await?;
    print_post(&post);
    Ok(())
}

pub async fn post_delete(app: &App, id: &str) -> Result<()> {
    let sync = app.sync()?;
    let (identity, _) = feed_identity(app, &sync)?;
    sync.delete_post(id, &identity).await?;
    println!("Deleted {id}.");
    Ok(())
}

pub async fn post_like(app: &App, id: &str) -> Result<()> {
    let sync = app.sync()?;
    let (identity, _) = feed_identity(app, &sync)?;
    let post = sync.toggle_like(id, &identity).await?;
    print_post(&post);
    Ok(())
}

pub async fn post_comment(app: &App, id: &str, text: &str) -> Result<()> {
    let sync = app.sync()?;
    let (_, author_name) = feed_identity(app, &sync)?;
    sync.add_comment(id, &author_name, text).await?;
    println!("Comment added to {id}.");
    Ok(())
}

// ---------------------------------------------------------------------------
// Remote account
// ---------------------------------------------------------------------------

pub async fn remote_sign_up(app: &App, email: &str, password: &str, username: &str) -> Result<()> {
    let sync = app.sync()?;
    match sync.remote_sign_up(email, password, username).await? {
        Some(session) => {
            app.save_remote_session(Some(&session))?;
            println!("Signed up and signed in as {email}.");
        }
        None => println!("Sign-up received; confirm the e-mail, then sign in."),
    }
    Ok(())
}

pub async fn remote_sign_in(app: &App, email: &str, password: &str) -> Result<()> {
    let sync = app.sync()?;
    let session = sync.remote_sign_in(email, password).await?;
    app.save_remote_session(Some(&session))?;
    info!(user_id = %session.user_id, "remote session saved");
    println!("Signed in as {email}.");
    Ok(())
}

pub async fn remote_sign_out(app: &App) -> Result<()> {
    let sync = app.sync()?;
    let result = sync.remote_sign_out().await;
    app.save_remote_session(None)?;
    result?;
    println!("Signed out of the remote backend.");
    Ok(())
}

pub async fn sync_profile(app: &App) -> Result<()> {
    let sync = app.sync()?;
    if sync.mode() == SyncMode::LocalOnly {
        bail!("no remote backend configured");
    }
    sync.sync_profile(&app.settings().get()).await?;
    println!("Profile synced.");
    Ok(())
}

// ---------------------------------------------------------------------------
// AI
// ---------------------------------------------------------------------------

/// Print the quota line and turn non-success outcomes into errors.
fn finish<T>(outcome: AiOutcome<T>) -> Result<T> {
    let quota = outcome.quota();
    match outcome {
        AiOutcome::Ok { value, .. } => {
            eprintln!("AI quota: {quota}");
            Ok(value)
        }
        AiOutcome::QuotaExceeded(_) => bail!("daily AI limit reached ({quota}); try again tomorrow"),
        AiOutcome::Failed { reason, .. } => bail!("AI request failed: {reason} ({quota})"),
    }
}

pub async fn ai_ask(app: &App, message: &str) -> Result<()> {
    let ai = app.ai()?;
    let history: Vec<ChatTurn> = Vec::new();
    let reply = finish(ai.ask_doula(&app.catalog().config(), &history, message).await)?;
    println!("{reply}");
    Ok(())
}

pub async fn ai_name(app: &App, name: &str, favorite: bool) -> Result<()> {
    let ai = app.ai()?;
    let meaning = finish(ai.name_meaning(name).await)?;
    print_json(&meaning)?;
    if favorite {
        let settings = app.settings();
        let already = settings.get().name_favorites.iter().any(|n| n.name == meaning.name);
        if !already {
            settings.toggle_favorite_name(meaning)?;
            push_settings(app).await?;
        }
        println!("Saved to favorites.");
    }
    Ok(())
}

pub async fn ai_week(app: &App, week: u8, apply: bool) -> Result<()> {
    let catalog = app.catalog();
    let products = catalog.active_products();
    let mut weeks = catalog.weeks();
    let index = weeks
        .iter()
        .position(|w| w.week == week)
        .with_context(|| format!("no week {week} in the catalog"))?;

    let ai = app.ai()?;
    let generated = finish(ai.weekly_info(week, &products).await)?;
    print_json(&generated)?;

    if apply {
        generated.apply_to(&mut weeks[index], &products);
        let sync = app.sync()?;
        sync.save_weeks(&weeks)?;
        sync.flush().await;
        println!("Week {week} updated.");
    }
    Ok(())
}
