use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::Confirm;
use queue::{HttpQueueApi, QueueApi, QueueEvent, QueuePoller};
use std::path::PathBuf;
use std::sync::Arc;
use store::{HandleStore, JsonKvStore, MemoryHandleStore, SqliteHandleStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracker::{DirectoryPlatform, PathPlatform, ProgressTracker, TrackerError, TrackerState};

mod config;
mod output;

use config::Settings;

#[derive(Parser)]
#[command(name = "encwatch")]
#[command(about = "Watch encoder progress files and the remote encoding queue")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file (defaults to settings.json in the app data directory)
    #[arg(long, global = true, env = "ENCWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Base URL of the queue API
    #[arg(long, global = true, env = "ENCWATCH_API_URL")]
    api_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Grant access to the encoder output directory
    Grant {
        /// Directory to track; opens a folder picker when omitted (if built with it)
        path: Option<PathBuf>,
    },

    /// Print progress of every file in the granted directory
    Status {
        /// Emit rows as JSON
        #[arg(long)]
        json: bool,
    },

    /// Rescan the granted directory on a timer until interrupted
    Watch {
        /// Rescan period in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,
    },

    /// Forget the granted directory
    Forget,

    /// Show the remote queue, refreshing until interrupted
    Queue {
        /// Fetch once and exit
        #[arg(long)]
        once: bool,

        /// Emit the queue as JSON (implies --once)
        #[arg(long)]
        json: bool,
    },

    /// Cancel a queued or running job
    Cancel {
        /// Job id
        id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Check that the queue API is reachable
    Health,

    /// Print the effective settings
    Config {
        /// Write the current settings to the settings file
        #[arg(long)]
        write: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout is for tables.
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let settings_path = cli.config.clone().unwrap_or_else(Settings::default_path);
    let mut settings = Settings::load(&settings_path)?;
    if let Some(url) = cli.api_url {
        settings.api_base_url = url;
    }

    match cli.command {
        Commands::Grant { path } => grant_command(&settings, path).await,
        Commands::Status { json } => status_command(&settings, json).await,
        Commands::Watch { interval_ms } => watch_command(&settings, interval_ms).await,
        Commands::Forget => forget_command(&settings),
        Commands::Queue { once, json } => queue_command(&settings, once || json, json).await,
        Commands::Cancel { id, yes } => cancel_command(&settings, &id, yes).await,
        Commands::Health => health_command(&settings).await,
        Commands::Config { write } => config_command(&settings, &settings_path, write),
    }
}

fn open_store(settings: &Settings) -> Arc<dyn HandleStore> {
    let db_path = settings.database_path();
    match SqliteHandleStore::open_or_create(&db_path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!(
                "could not open {}: {:#}; the grant will not outlive this run",
                db_path.display(),
                e
            );
            Arc::new(MemoryHandleStore::new())
        }
    }
}

fn open_tracker(settings: &Settings, platform: Arc<dyn DirectoryPlatform>) -> ProgressTracker {
    let names = Arc::new(JsonKvStore::new(settings.state_path()));
    ProgressTracker::new(platform, open_store(settings), names)
}

fn grant_platform(path: Option<PathBuf>) -> Arc<dyn DirectoryPlatform> {
    match path {
        Some(path) => Arc::new(PathPlatform::with_path(path)),
        #[cfg(feature = "dialog")]
        None => Arc::new(tracker::DialogPlatform),
        #[cfg(not(feature = "dialog"))]
        None => Arc::new(PathPlatform::restore_only()),
    }
}

fn print_files(tracker: &ProgressTracker) {
    let rows = tracker.rows();
    let name = tracker.directory_name();
    let error = tracker.last_error();
    print!(
        "{}",
        output::render_files(name.as_deref(), &rows, error.as_deref(), tracker.last_scan())
    );
}

async fn grant_command(settings: &Settings, path: Option<PathBuf>) -> Result<()> {
    let tracker = open_tracker(settings, grant_platform(path));
    match tracker.grant_access().await {
        Ok(true) => {
            info!("tracking {}", tracker.directory_name().unwrap_or_default());
            print_files(&tracker);
            Ok(())
        }
        Ok(false) => {
            println!("no directory selected");
            Ok(())
        }
        Err(TrackerError::Unsupported) => {
            bail!("no folder picker in this build; pass the directory: encwatch grant <PATH>")
        }
        Err(e) => Err(e.into()),
    }
}

async fn restored(settings: &Settings) -> Option<ProgressTracker> {
    let tracker = open_tracker(settings, Arc::new(PathPlatform::restore_only()));
    if tracker.restore().await == TrackerState::Active {
        return Some(tracker);
    }
    match tracker.directory_name() {
        Some(name) => println!("access to {name} was lost; grant it again with `encwatch grant`"),
        None => println!("no directory granted; run `encwatch grant <PATH>`"),
    }
    None
}

async fn status_command(settings: &Settings, json: bool) -> Result<()> {
    let Some(tracker) = restored(settings).await else {
        return Ok(());
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&tracker.rows())?);
    } else {
        print_files(&tracker);
    }
    Ok(())
}

async fn watch_command(settings: &Settings, interval_ms: Option<u64>) -> Result<()> {
    let Some(tracker) = restored(settings).await else {
        return Ok(());
    };
    let period = match interval_ms {
        Some(ms) => std::time::Duration::from_millis(ms.max(100)),
        None => settings.refresh_interval(),
    };
    print_files(&tracker);

    let mut ticker = tokio::time::interval(period);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                match tracker.refresh().await {
                    Ok(_) | Err(TrackerError::Scan(_)) => {}
                    Err(TrackerError::ScanInProgress) => continue,
                    Err(e) => return Err(e.into()),
                }
                println!();
                print_files(&tracker);
            }
        }
    }
    Ok(())
}

fn forget_command(settings: &Settings) -> Result<()> {
    let tracker = open_tracker(settings, Arc::new(PathPlatform::restore_only()));
    tracker.forget();
    println!("directory forgotten");
    Ok(())
}

fn poller(settings: &Settings) -> Result<Arc<QueuePoller>> {
    let api = HttpQueueApi::new(&settings.api_base_url)?;
    Ok(Arc::new(QueuePoller::new(Arc::new(api), settings.poller_config())))
}

async fn queue_command(settings: &Settings, once: bool, json: bool) -> Result<()> {
    let poller = poller(settings)?;
    if once {
        poller
            .refresh()
            .await
            .with_context(|| format!("fetching queue from {}", settings.api_base_url))?;
        let view = poller.view();
        if json {
            println!("{}", serde_json::to_string_pretty(&view.jobs)?);
        } else {
            print!("{}", output::render_queue(&view));
        }
        return Ok(());
    }

    let events = poller.events();
    let handle = poller.start();
    let mut redraw = tokio::time::interval(std::time::Duration::from_millis(200));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = redraw.tick() => {
                let mut changed = false;
                for event in events.try_iter() {
                    if let QueueEvent::FetchFailed(err) = &event {
                        tracing::debug!("poll failed: {}", err);
                    }
                    changed = true;
                }
                if changed {
                    println!();
                    print!("{}", output::render_queue(&poller.view()));
                }
            }
        }
    }
    handle.stop();
    Ok(())
}

/// `--yes` skips the prompt; without a terminal there is nobody to ask.
fn confirm_cancel(id: &str, yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    let confirmed = Confirm::new()
        .with_prompt(format!("Cancel job {id}?"))
        .default(false)
        .interact()
        .context("no terminal to confirm on; pass --yes to cancel without asking")?;
    Ok(confirmed)
}

async fn cancel_command(settings: &Settings, id: &str, yes: bool) -> Result<()> {
    let poller = poller(settings)?;
    if let Err(e) = poller.refresh().await {
        warn!("could not load the queue before cancelling: {}", e);
    }
    if let Some(job) = poller.view().job(id) {
        println!("{}", output::job_line(job, false));
        if job.status.is_terminal() {
            warn!("job {} is already {}", id, job.status);
        }
    }
    if !confirm_cancel(id, yes)? {
        println!("not cancelled");
        return Ok(());
    }

    if let Err(e) = poller.cancel(id).await {
        let view = poller.view();
        bail!(view.cancel_error.unwrap_or_else(|| e.to_string()));
    }
    match poller.view().job(id) {
        Some(job) => println!("{}", output::job_line(job, false)),
        None => println!("job {id} cancelled"),
    }
    Ok(())
}

async fn health_command(settings: &Settings) -> Result<()> {
    let api = HttpQueueApi::new(&settings.api_base_url)?;
    let body = api
        .health()
        .await
        .with_context(|| format!("queue API at {} is not healthy", settings.api_base_url))?;
    println!("{}: {}", settings.api_base_url, body);
    Ok(())
}

fn config_command(settings: &Settings, path: &std::path::Path, write: bool) -> Result<()> {
    if write {
        settings.save(path)?;
        info!("settings written to {}", path.display());
    }
    println!("{}", serde_json::to_string_pretty(settings)?);
    println!("settings file: {}", path.display());
    println!("database: {}", settings.database_path().display());
    Ok(())
}
