//! Cadence CLI
//!
//! Command-line interface for registering items, running review sessions and
//! inspecting a learner's schedule.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use cadence_core::{
    EngineConfig, EngineError, ItemState, OffsetCalendar, Rating, ReviewEngine, SessionCursor,
    SessionMode, SessionPhase, SqliteRepository, Transition,
};

/// Database file name inside `--data-dir`
const DB_FILE: &str = "cadence.db";

/// Cadence - spaced-repetition scheduler CLI
#[derive(Parser)]
#[command(name = "cadence")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "CLI for the Cadence spaced-repetition scheduler")]
struct Cli {
    /// Directory holding the schedule database
    #[arg(long, global = true, env = "CADENCE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// JSON engine configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// UTC offset that defines calendar days, e.g. +09:00
    #[arg(long, global = true, default_value = "Z")]
    utc_offset: String,

    /// Learner whose schedule to operate on
    #[arg(long, global = true, env = "CADENCE_USER", default_value = "default")]
    user: String,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start scheduling one or more items
    Register {
        /// Item ids, in the order new items should be introduced
        #[arg(required = true)]
        items: Vec<String>,
    },

    /// Stop scheduling an item and delete its history
    Remove { item: String },

    /// Record a rating for an item
    Review {
        item: String,
        /// again, hard, good or easy (or 1-4)
        rating: String,
        /// Reuse the id printed by an earlier attempt to retry safely
        #[arg(long)]
        submission_id: Option<String>,
        /// Fail if the item changed since this version was read
        #[arg(long)]
        expected_version: Option<u64>,
    },

    /// Show what each rating would schedule, without recording anything
    Preview { item: String },

    /// List the next batch of a review session
    Session {
        #[arg(long, default_value = "20")]
        limit: usize,
        /// review-only or include-new
        #[arg(long, default_value = "review-only")]
        mode: String,
        /// Session instant (RFC 3339); defaults to now
        #[arg(long)]
        as_of: Option<String>,
        /// Cursor token printed by the previous page
        #[arg(long)]
        cursor: Option<String>,
    },

    /// Due-load counts for the schedule
    Summary {
        /// Reference instant (RFC 3339); defaults to now
        #[arg(long)]
        as_of: Option<String>,
    },

    /// Show one item, or every item when none is given
    Show { item: Option<String> },

    /// Write a consistent copy of the database
    Backup { output: PathBuf },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries command output
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::WARN.into()))
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let repo = Arc::new(open_repository(cli.data_dir.clone())?);
    let config = load_config(cli.config.as_ref())?;
    let calendar = OffsetCalendar::parse_offset(&cli.utc_offset)
        .with_context(|| format!("Invalid --utc-offset: {}", cli.utc_offset))?;
    let engine = ReviewEngine::new(repo.clone(), config)?.with_calendar(Arc::new(calendar));
    let user = cli.user.as_str();

    match cli.command {
        Commands::Register { items } => run_register(&engine, user, &items, cli.json),
        Commands::Remove { item } => run_remove(&engine, user, &item),
        Commands::Review {
            item,
            rating,
            submission_id,
            expected_version,
        } => run_review(&engine, user, &item, &rating, submission_id, expected_version, cli.json),
        Commands::Preview { item } => run_preview(&engine, user, &item, cli.json),
        Commands::Session {
            limit,
            mode,
            as_of,
            cursor,
        } => run_session(&engine, user, limit, &mode, as_of, cursor, cli.json),
        Commands::Summary { as_of } => run_summary(&engine, user, as_of, cli.json),
        Commands::Show { item } => run_show(&engine, user, item, cli.json),
        Commands::Backup { output } => run_backup(&repo, output),
    }
}

fn open_repository(data_dir: Option<PathBuf>) -> anyhow::Result<SqliteRepository> {
    let path = match data_dir {
        Some(dir) => {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Cannot create data dir {}", dir.display()))?;
            Some(dir.join(DB_FILE))
        }
        None => None,
    };
    let repo = SqliteRepository::open(path).context("Failed to open schedule database")?;
    tracing::info!(path = ?repo.path(), "opened schedule database");
    Ok(repo)
}

/// `--config` file (or defaults), then `CADENCE_*` overrides
fn load_config(path: Option<&PathBuf>) -> anyhow::Result<EngineConfig> {
    let base = match path {
        Some(p) => EngineConfig::from_json_file(p)?,
        None => EngineConfig::default(),
    };
    Ok(base.with_env_overrides()?)
}

fn parse_instant(raw: Option<String>) -> anyhow::Result<DateTime<Utc>> {
    match raw {
        Some(s) => Ok(DateTime::parse_from_rfc3339(&s)
            .with_context(|| format!("Invalid RFC 3339 timestamp: {}", s))?
            .with_timezone(&Utc)),
        None => Ok(Utc::now()),
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_register(engine: &ReviewEngine, user: &str, items: &[String], json: bool) -> anyhow::Result<()> {
    let mut states = Vec::with_capacity(items.len());
    for item in items {
        states.push(engine.register_item(user, item)?);
    }
    if json {
        return print_json(&states);
    }
    for state in &states {
        println!(
            "{} {} {}",
            "Registered".green().bold(),
            state.item_id,
            format!("(#{})", state.sequence).dimmed()
        );
    }
    Ok(())
}

fn run_remove(engine: &ReviewEngine, user: &str, item: &str) -> anyhow::Result<()> {
    let removed = engine.remove_item(user, item)?;
    println!(
        "{} {} ({} reviews deleted)",
        "Removed".yellow().bold(),
        removed.item_id,
        removed.review_history.len()
    );
    Ok(())
}

fn run_review(
    engine: &ReviewEngine,
    user: &str,
    item: &str,
    rating: &str,
    submission_id: Option<String>,
    expected_version: Option<u64>,
    json: bool,
) -> anyhow::Result<()> {
    let rating: Rating = rating.parse()?;
    let submission_id = submission_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let state = match engine.submit_review(user, item, rating, &submission_id, expected_version) {
        Ok(state) => state,
        Err(e) => {
            let hint = review_failure_hint(&e, item, &submission_id);
            return Err(anyhow::Error::new(e).context(hint));
        }
    };

    if json {
        return print_json(&state);
    }
    println!("{}: {}", "Submission".white().bold(), submission_id);
    print_state(&state, engine.config().mastery_threshold);
    Ok(())
}

/// What the user can do about a failed review
fn review_failure_hint(err: &EngineError, item: &str, submission_id: &str) -> String {
    match err {
        EngineError::Conflict { actual, .. } => format!(
            "Review failed; item {} is now at version {}, check it with `cadence show {}` and resubmit with --expected-version {}",
            item, actual, item, actual
        ),
        e if e.is_retryable() => {
            format!("Review failed; retry with --submission-id {}", submission_id)
        }
        _ => "Review failed".to_string(),
    }
}

fn run_preview(engine: &ReviewEngine, user: &str, item: &str, json: bool) -> anyhow::Result<()> {
    let preview = engine.preview_review(user, item)?;
    if json {
        return print_json(&preview);
    }

    println!("{}", format!("=== Preview: {} ===", item).cyan().bold());
    for rating in Rating::ALL {
        print_transition(rating, preview.get(rating));
    }
    Ok(())
}

fn print_transition(rating: Rating, t: &Transition) {
    let label = match rating {
        Rating::Again => rating.as_str().red(),
        Rating::Hard => rating.as_str().yellow(),
        Rating::Good => rating.as_str().green(),
        Rating::Easy => rating.as_str().cyan(),
    };
    println!(
        "  {:6} level {:>2}  factor {:.2}  in {:>3} days",
        label, t.level, t.difficulty_factor, t.interval_days
    );
}

fn run_session(
    engine: &ReviewEngine,
    user: &str,
    limit: usize,
    mode: &str,
    as_of: Option<String>,
    cursor: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let mode: SessionMode = mode.parse()?;
    let cursor = cursor.as_deref().map(SessionCursor::from_token).transpose()?;
    // A resumed page must use the instant the cursor was issued for
    let as_of = match (&cursor, as_of) {
        (Some(c), None) => c.as_of,
        (_, raw) => parse_instant(raw)?,
    };

    let batch = engine.get_session(user, limit, mode, as_of, cursor)?;
    if json {
        return print_json(&batch);
    }

    println!("{}", format!("=== Session ({}) ===", mode).cyan().bold());
    if batch.items.is_empty() {
        println!("{}", "Nothing to review.".dimmed());
    }
    for (i, item) in batch.items.iter().enumerate() {
        let phase = match item.phase {
            SessionPhase::Overdue => "overdue".red(),
            SessionPhase::DueToday => "today".yellow(),
            SessionPhase::New => "new".green(),
        };
        println!(
            "{:>3}. {:8} {} {}",
            i + 1,
            phase,
            item.item_id,
            format!("(level {}, v{})", item.level, item.version).dimmed()
        );
    }
    if let Some(next) = &batch.next_cursor {
        println!();
        println!("{}: {}", "More available, resume with --cursor".dimmed(), next.to_token()?);
    }
    Ok(())
}

fn run_summary(engine: &ReviewEngine, user: &str, as_of: Option<String>, json: bool) -> anyhow::Result<()> {
    let as_of = parse_instant(as_of)?;
    let summary = engine.get_summary(user, as_of)?;
    if json {
        return print_json(&summary);
    }

    println!("{}", "=== Schedule Summary ===".cyan().bold());
    println!();
    println!("{}: {}", "Total Items".white().bold(), summary.total);
    println!("{}: {}", "Overdue".white().bold(), summary.overdue.to_string().red());
    println!("{}: {}", "Due Today".white().bold(), summary.due_today.to_string().yellow());
    println!("{}: {}", "Due Tomorrow".white().bold(), summary.due_tomorrow);
    println!("{}: {}", "Due This Week".white().bold(), summary.due_this_week);
    println!("{}: {}", "Later".white().bold(), summary.later);

    if !summary.due_by_date.is_empty() {
        println!();
        println!("{}", "=== By Date ===".yellow().bold());
        for (date, count) in summary.due_by_date.iter().take(14) {
            println!("  {}  {:>4} {}", date, count, "#".repeat((*count).min(40)));
        }
    }
    Ok(())
}

fn run_show(engine: &ReviewEngine, user: &str, item: Option<String>, json: bool) -> anyhow::Result<()> {
    let threshold = engine.config().mastery_threshold;
    let states = match item {
        Some(id) => vec![engine.get_item(user, &id)?],
        None => engine.list_items(user)?,
    };
    if json {
        return print_json(&states);
    }
    if states.is_empty() {
        println!("{}", "No items registered.".dimmed());
    }
    for state in &states {
        print_state(state, threshold);
        println!();
    }
    Ok(())
}

fn print_state(state: &ItemState, mastery_threshold: u32) {
    let status = if state.is_new() {
        "NEW".green().bold()
    } else if state.is_mastered(mastery_threshold) {
        "MASTERED".cyan().bold()
    } else {
        "LEARNING".yellow().bold()
    };
    println!("{} [{}]", state.item_id.white().bold(), status);
    println!("  {}: {}", "Level".dimmed(), state.level);
    println!("  {}: {:.2}", "Difficulty Factor".dimmed(), state.difficulty_factor);
    println!("  {}: {}", "Streak".dimmed(), state.consecutive_correct);
    if let Some(last) = state.last_reviewed {
        println!("  {}: {}", "Last Reviewed".dimmed(), last.format("%Y-%m-%d %H:%M:%S"));
    }
    println!("  {}: {}", "Next Review".dimmed(), state.next_review.format("%Y-%m-%d %H:%M:%S"));
    println!("  {}: {}", "Reviews".dimmed(), state.review_history.len());
    println!("  {}: {}", "Version".dimmed(), state.version);
}

fn run_backup(repo: &SqliteRepository, output: PathBuf) -> anyhow::Result<()> {
    println!("{}", "=== Cadence Backup ===".cyan().bold());
    println!();

    if output.exists() {
        anyhow::bail!("Refusing to overwrite existing file: {}", output.display());
    }
    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent)?;
    }

    println!("Copying database...");
    if let Some(path) = repo.path() {
        println!("  {} {}", "From:".dimmed(), path.display());
    }
    println!("  {}   {}", "To:".dimmed(), output.display());
    repo.backup_to(&output)?;

    let file_size = std::fs::metadata(&output)?.len();
    println!();
    println!("{} Backup complete ({} bytes)", "OK".green().bold(), file_size);
    Ok(())
}
