use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use hevysync::mirror::pusher;
use hevysync::storage::repository;
use hevysync::{
    Config, Database, HevyClient, HevySync, MirrorApi, MirrorDatabases, NotionClient,
    PushOptions, SyncOptions,
};

#[derive(Parser)]
#[command(name = "hevysync", about = "Hevy to SQLite to Notion sync")]
struct Cli {
    /// Database path (default: $HEVYSYNC_DB or ~/.hevysync/hevysync.db)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Page size for workout, folder and routine requests
    #[arg(long)]
    page_size: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

/// Progress reporter that writes to stderr.
struct StderrProgress;

impl hevysync::SyncProgress for StderrProgress {
    fn on_page_fetched(&self, entity_key: &str, page: u32, page_count: u32) {
        eprint!("\r  {entity_key}: page {page}/{page_count}   ");
        if page >= page_count {
            eprintln!();
        }
    }

    fn on_entity_complete(&self, report: &hevysync::SyncReport) {
        eprintln!("  Done: {} {} synced", report.items_synced, report.entity_key);
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Pull data from Hevy into the local store
    Sync {
        #[command(subcommand)]
        target: SyncTarget,
    },
    /// Recompute per-exercise progress from the workout history
    Progress,
    /// Push local records to Notion
    Mirror {
        #[command(subcommand)]
        action: MirrorAction,
    },
    /// Run the HTTP trigger surface and the periodic sync
    Serve {
        /// Listen port (default: $PORT or 8080)
        #[arg(long)]
        port: Option<u16>,
        /// Minutes between scheduled syncs (default: $SYNC_INTERVAL_MINUTES or 30)
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Show sync state and record counts
    Status,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum SyncTarget {
    /// Replay workout events since the stored cursor
    Incremental,
    /// Re-fetch every workout
    Full,
    /// Refresh the exercise template cache
    Templates,
    /// Sync routine folders and routines
    Routines,
    /// Templates, routines, then the incremental pass
    All,
}

#[derive(Subcommand)]
enum MirrorAction {
    /// Push every unsynced record
    Push {
        /// One record at a time with a fixed pause
        #[arg(long)]
        sequential: bool,
    },
    /// Push one workout and its children
    PushWorkout {
        /// Hevy workout id
        id: String,
    },
    /// Create the mirror databases under a parent page and store their ids
    Setup {
        /// Notion page id to create the databases under
        parent: String,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
    /// List all config values
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut config = Config::from_env()?;
    if let Some(path) = cli.db {
        config.db_path = path;
    }
    let db = Database::open_at(&config.db_path).await?;

    let mut options = SyncOptions::default();
    if let Some(ps) = cli.page_size {
        options.page_size = ps;
    }

    match cli.command {
        Commands::Sync { target } => {
            let app = HevySync::new(db, Arc::new(HevyClient::from_env()?)).with_options(options);
            handle_sync(&app, target).await?;
        }
        Commands::Progress => {
            let report = hevysync::progress::recompute_all(&db).await?;
            println!(
                "Progress: {} exercises, {} changed",
                report.templates, report.changed
            );
        }
        Commands::Mirror { action } => {
            let notion = NotionClient::from_env()?;
            handle_mirror(&db, &notion, action).await?;
        }
        Commands::Serve { port, interval } => {
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(minutes) = interval {
                config.sync_interval = hevysync::config::interval_from_minutes(minutes)?;
            }
            let secret = config.require_secret()?.to_string();
            let app = HevySync::new(db, Arc::new(HevyClient::from_env()?)).with_options(options);
            let mirror: Option<Arc<dyn MirrorApi>> = match NotionClient::from_env() {
                Ok(client) => Some(Arc::new(client) as Arc<dyn MirrorApi>),
                Err(e) => {
                    log::warn!("Mirror disabled: {e}");
                    None
                }
            };
            let state = hevysync::server::AppState::new(app, mirror, &secret);
            hevysync::server::serve(state, config.port, config.sync_interval).await?;
        }
        Commands::Status => {
            print_status(&db).await?;
        }
        Commands::Config { action } => {
            handle_config(&db, action).await?;
        }
    }

    Ok(())
}

async fn handle_sync(app: &HevySync, target: SyncTarget) -> anyhow::Result<()> {
    let progress = StderrProgress;
    match target {
        SyncTarget::Incremental => {
            let report = app.sync_incremental(&progress).await?;
            print_events(&report);
        }
        SyncTarget::Full => {
            let report = app.sync_full(&progress).await?;
            println!(
                "Full sync: {} workouts in {} pages",
                report.items_synced, report.pages_fetched
            );
        }
        SyncTarget::Templates => {
            let report = app.sync_templates(&progress).await?;
            println!("Templates: {} synced", report.items_synced);
        }
        SyncTarget::Routines => {
            let report = app.sync_routines(&progress).await?;
            println!(
                "Routines: {} folders, {} routines",
                report.folders.items_synced, report.routines.items_synced
            );
        }
        SyncTarget::All => {
            let templates = app.sync_templates(&progress).await?;
            let routines = app.sync_routines(&progress).await?;
            let events = app.sync_incremental(&progress).await?;
            println!("Templates: {} synced", templates.items_synced);
            println!(
                "Routines: {} folders, {} routines",
                routines.folders.items_synced, routines.routines.items_synced
            );
            print_events(&events);
        }
    }
    Ok(())
}

fn print_events(report: &hevysync::EventReport) {
    println!(
        "Incremental: {} updated, {} deleted, {} ignored (cursor {})",
        report.updated, report.deleted, report.ignored, report.cursor
    );
}

async fn handle_mirror(
    db: &Database,
    notion: &NotionClient,
    action: MirrorAction,
) -> anyhow::Result<()> {
    match action {
        MirrorAction::Setup { parent } => {
            let dbs = pusher::setup_databases(db, notion, &parent).await?;
            println!("Created mirror databases:");
            println!("{}", serde_json::to_string_pretty(&dbs)?);
        }
        MirrorAction::Push { sequential } => {
            let dbs = load_databases(db).await?;
            let report =
                pusher::push_unsynced(db, notion, &dbs, PushOptions { sequential }).await?;
            println!(
                "Mirror: {} synced, {} errors, {} total",
                report.synced, report.errors, report.total
            );
        }
        MirrorAction::PushWorkout { id } => {
            let dbs = load_databases(db).await?;
            let report = pusher::push_workout(db, notion, &dbs, &id).await?;
            println!(
                "Workout {id}: {} synced, {} errors",
                report.synced, report.errors
            );
        }
    }
    Ok(())
}

async fn load_databases(db: &Database) -> anyhow::Result<MirrorDatabases> {
    let dbs = db
        .reader()
        .call(|conn| MirrorDatabases::load(conn))
        .await?;
    if dbs.workout_tree().is_err() {
        anyhow::bail!("Mirror databases not configured. Run 'hevysync mirror setup <PAGE_ID>' first.");
    }
    Ok(dbs)
}

async fn print_status(db: &Database) -> anyhow::Result<()> {
    let (state, counts) = db
        .reader()
        .call(|conn| {
            Ok::<_, rusqlite::Error>((
                repository::get_sync_state(conn)?,
                repository::record_counts(conn)?,
            ))
        })
        .await?;

    println!("Sync Status");
    println!(
        "  Last synced:  {}",
        state.last_synced_at.as_deref().unwrap_or("never")
    );
    println!(
        "  Cursor:       {}",
        state.last_event_timestamp.as_deref().unwrap_or("(none)")
    );
    println!("  In progress:  {}", state.sync_in_progress);
    if let Some(err) = &state.last_error {
        println!("  Last error:   {err}");
    }
    println!();
    println!(
        "  Workouts:     {} ({} deleted, {} unsynced)",
        counts.workouts, counts.deleted_workouts, counts.unsynced_workouts
    );
    println!("  Exercises:    {}", counts.exercises);
    println!("  Sets:         {}", counts.sets);
    println!("  Templates:    {}", counts.exercise_templates);
    println!(
        "  Routines:     {} in {} folders",
        counts.routines, counts.routine_folders
    );
    println!("  Progress:     {}", counts.exercise_progress);
    Ok(())
}

async fn handle_config(db: &Database, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let val: Option<String> = db
                .reader()
                .call({
                    let key = key.clone();
                    move |conn| repository::get_config(conn, &key)
                })
                .await?;
            match val {
                Some(v) => println!("{key} = {v}"),
                None => println!("{key} is not set"),
            }
        }
        ConfigAction::Set { key, value } => {
            db.writer()
                .call(move |conn| repository::set_config(conn, &key, &value))
                .await?;
            println!("Config updated.");
        }
        ConfigAction::List => {
            let items = db.reader().call(|conn| repository::list_config(conn)).await?;
            if items.is_empty() {
                println!("No configuration set.");
            } else {
                for (k, v) in items {
                    println!("{k} = {v}");
                }
            }
        }
    }
    Ok(())
}
