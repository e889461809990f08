//! calisthenics30 - 30-day bodyweight training program

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing::{Level, info, warn};

use calisthenics30::auth::SupabaseAuth;
use calisthenics30::catalog::{Catalog, PROGRAM_DAYS, WorkoutPlan};
use calisthenics30::config::{AppConfig, DEFAULT_DB_PATH};
use calisthenics30::stats::{Progress, format_duration};
use calisthenics30::store::{CachedStore, LocalStore, ProgressStore, RemoteStore};
use calisthenics30::tui::App;
use calisthenics30::Database;

#[derive(Parser)]
#[command(name = "calisthenics30")]
#[command(author, version, about = "30-day calisthenics program with guided sessions")]
struct Cli {
    /// SQLite file for the completion log
    #[arg(long, global = true, env = "CALISTHENICS_DB", default_value = DEFAULT_DB_PATH)]
    db: String,

    /// Hosted backend URL; leave unset for local-only mode
    #[arg(long, global = true, env = "SUPABASE_URL")]
    supabase_url: Option<String>,

    #[arg(long, global = true, env = "SUPABASE_ANON_KEY", hide_env_values = true)]
    supabase_key: Option<String>,

    #[arg(long, global = true, env = "CALISTHENICS_EMAIL")]
    email: Option<String>,

    #[arg(long, global = true, env = "CALISTHENICS_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open TUI dashboard
    Tui,

    /// Print the plan for one day
    Plan {
        /// Program day, 1-30
        day: u8,
    },

    /// List completed sessions, newest first
    History {
        /// Number of records to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show progress statistics
    Stats,

    /// Create an account with the configured email and password
    Signup,

    /// Send completions that have not reached the server yet
    Sync,

    /// Delete the local completion log
    Reset,
}

/// Where completion records go for this run
enum Backend {
    Local(Arc<LocalStore>),
    Remote {
        store: Arc<CachedStore<RemoteStore>>,
        auth: Arc<SupabaseAuth>,
    },
}

impl Backend {
    fn store(&self) -> Arc<dyn ProgressStore> {
        match self {
            Backend::Local(store) => store.clone() as Arc<dyn ProgressStore>,
            Backend::Remote { store, .. } => store.clone() as Arc<dyn ProgressStore>,
        }
    }

    /// End the remote session. Tokens are never kept past one run.
    async fn disconnect(&self) {
        if let Backend::Remote { auth, .. } = self
            && let Err(e) = auth.sign_out().await
        {
            warn!("Sign-out failed: {}", e);
        }
    }
}

async fn connect(config: &AppConfig) -> Result<Backend> {
    let db = Database::open(&config.db_path)
        .with_context(|| format!("failed to open database {}", config.db_path))?;

    let Some(supabase) = config.supabase.clone() else {
        info!("No backend configured, running local-only");
        return Ok(Backend::Local(Arc::new(LocalStore::new(db))));
    };
    let Some(credentials) = &config.credentials else {
        bail!("SUPABASE_URL is set, so CALISTHENICS_EMAIL and CALISTHENICS_PASSWORD are required");
    };

    let auth = Arc::new(SupabaseAuth::new(supabase.clone()));
    let session = auth
        .sign_in(&credentials.email, &credentials.password)
        .await
        .context("sign-in failed")?;

    let remote = RemoteStore::new(supabase, Arc::clone(&auth));
    let store = Arc::new(CachedStore::new(db, remote, session.user_id));

    let report = store.sync_pending().await?;
    if report.failed > 0 {
        warn!("{} completions still waiting to sync", report.failed);
    }
    Ok(Backend::Remote { store, auth })
}

fn print_plan(day: u8, plan: &WorkoutPlan) {
    println!("{}", plan.title());
    println!("{:-<60}", "");
    if plan.is_rest() {
        println!("Rest day. Stretch, hydrate, and recover.");
        return;
    }
    if let Some(description) = plan.description() {
        println!("{}", description);
        println!();
    }
    for exercise in plan.exercises() {
        println!(
            "{:24} {} x {:12} rest {}s",
            exercise.name,
            exercise.set_count,
            exercise.work.label(),
            exercise.rest_secs
        );
        if let Some(tip) = &exercise.tip {
            println!("  tip: {}", tip);
        }
    }
    println!();
    println!("Day {}: {} sets in total", day, plan.total_sets());
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Tui);

    // Keep log lines from tearing through the TUI frames
    let level = if matches!(command, Commands::Tui) { Level::ERROR } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::new(cli.db, cli.supabase_url, cli.supabase_key, cli.email, cli.password)
        .context("invalid SUPABASE_URL")?;
    let catalog = Arc::new(Catalog::load()?);

    match command {
        Commands::Plan { day } => match catalog.workout_for_day(day) {
            Some(plan) => print_plan(day, plan),
            None => bail!("day {} is outside the program (1-{})", day, PROGRAM_DAYS),
        },

        Commands::Signup => {
            let (Some(supabase), Some(credentials)) = (config.supabase.clone(), &config.credentials) else {
                bail!("signup needs SUPABASE_URL, SUPABASE_ANON_KEY, CALISTHENICS_EMAIL and CALISTHENICS_PASSWORD");
            };
            SupabaseAuth::new(supabase)
                .sign_up(&credentials.email, &credentials.password)
                .await?;
            println!("Account created. Check your email to confirm it, then sign in.");
        }

        Commands::Reset => {
            let db = Database::open(&config.db_path)?;
            let removed = db.clear_synced()?;
            println!("Removed {} local records", removed);
            let kept = db.count_all_pending()?;
            if kept > 0 {
                println!("Kept {} records that have not reached the server yet; run `sync` to send them.", kept);
            }
            if !config.is_local_only() {
                println!("Records already on the server are kept and will reappear on the next load.");
            }
        }

        command => run_command(command, &config, catalog).await?,
    }

    Ok(())
}

/// Connect, run one store-backed command, then sign out whatever happened
async fn run_command(command: Commands, config: &AppConfig, catalog: Arc<Catalog>) -> Result<()> {
    let backend = connect(config).await?;
    let result = run_with_backend(command, &backend, catalog).await;
    backend.disconnect().await;
    result
}

/// Commands that read or write progress through the configured store
async fn run_with_backend(command: Commands, backend: &Backend, catalog: Arc<Catalog>) -> Result<()> {
    match command {
        Commands::Tui => {
            let records = backend.store().load().await?;
            let identity = match backend {
                Backend::Remote { auth, .. } => Some(auth.subscribe()),
                Backend::Local(_) => None,
            };
            let mut app = App::new(catalog, backend.store(), records, identity);
            // The UI blocks on terminal input, keep it off the async workers
            tokio::task::block_in_place(|| app.run())?;
        }

        Commands::History { limit } => {
            let records = backend.store().load().await?;
            println!("Completed sessions:");
            println!("{:-<60}", "");
            for r in records.iter().rev().take(limit) {
                let title = catalog
                    .workout_for_day(r.day_number)
                    .map(|p| p.title())
                    .unwrap_or("-");
                println!(
                    "{} | {:32} | {}",
                    r.completed_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
                    title,
                    format_duration(r.duration_secs)
                );
            }
        }

        Commands::Stats => {
            let records = backend.store().load().await?;
            let progress = Progress::new(&records);

            println!("Progress Statistics");
            println!("{:-<40}", "");
            println!(
                "Completed: {}/{} days ({}%)",
                progress.completed_days().len(),
                PROGRAM_DAYS,
                progress.percent_complete()
            );
            println!("Active days: {}", progress.distinct_active_days());
            println!("Daily streak: {}", progress.daily_streak(Local::now().date_naive()));
            println!("Total time: {}", format_duration(progress.total_duration_secs()));
            match progress.next_day() {
                Some(day) => println!("Next up: Day {}", day),
                None => println!("Program complete!"),
            }
            if let Backend::Remote { store, .. } = backend {
                let pending = store.pending_count().await?;
                if pending > 0 {
                    println!("Waiting to sync: {}", pending);
                }
            }
        }

        Commands::Sync => match backend {
            Backend::Local(_) => println!("Local-only mode, nothing to sync"),
            Backend::Remote { store, .. } => {
                // connect() already ran a pass; this reports what is left
                let report = store.sync_pending().await?;
                let pending = store.pending_count().await?;
                println!("Synced {} / still pending {}", report.synced, pending);
            }
        },

        Commands::Plan { .. } | Commands::Signup | Commands::Reset => {
            unreachable!("handled without a backend")
        }
    }
    Ok(())
}
