// Waiver-wire entry point.
//
// Startup sequence:
// 1. Parse CLI arguments
// 2. Initialize tracing (log to file)
// 3. Load config (copying defaults on first run)
// 4. Open database
// 5. Build collaborators: MLB Stats API, ESPN, report sinks
// 6. Run the pipeline once and exit

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Days, Local, NaiveDate};
use clap::Parser;
use directories::ProjectDirs;
use tracing::{error, info};

use waiver_wire::app::{App, RunOptions, RunSettings};
use waiver_wire::config::{self, Config};
use waiver_wire::db::Database;
use waiver_wire::espn::{EspnAuth, EspnClient};
use waiver_wire::mlb::MlbStatsClient;
use waiver_wire::report::{FileSink, ReportSink, WebhookSink};

#[derive(Parser)]
#[command(name = "waiver-wire")]
#[command(about = "Daily fantasy baseball waiver-wire pickups from MLB box scores")]
struct Args {
    /// Game date to ingest (YYYY-MM-DD). Defaults to yesterday.
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Date whose schedule filters the probables (YYYY-MM-DD). Defaults to
    /// the day after --date.
    #[arg(long)]
    target_date: Option<NaiveDate>,

    /// Re-apply a merged game date, or merge one older than the latest merged date
    #[arg(long)]
    force: bool,

    /// Directory containing config/ and defaults/
    #[arg(long, default_value = ".")]
    config_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Parse CLI arguments
    let args = Args::parse();
    let opts = run_options(&args)?;

    // 2. Initialize tracing (log to file)
    init_tracing(&args.config_dir)?;
    info!(
        date = %opts.game_date,
        target = %opts.target_date,
        force = opts.force,
        "waiver-wire starting"
    );

    // 3. Load config
    let config = config::load_config(&args.config_dir).context("failed to load configuration")?;
    info!(
        "Config loaded: league={}, season={}",
        config.league.league_id, config.league.season
    );

    // 4. Open database
    let db_path = database_path(&config)?;
    let db = Database::open(&db_path).context("failed to open database")?;
    info!("Database opened at {}", db_path);

    // 5. Build collaborators
    let timeout = Duration::from_secs(config.stats_api.timeout_secs);
    let stats = MlbStatsClient::new(config.stats_api.base_url.as_str(), timeout)
        .context("failed to build MLB Stats API client")?;
    let auth = EspnAuth {
        espn_s2: config.credentials.espn_s2.clone(),
        swid: config.credentials.swid.clone(),
    };
    let espn = EspnClient::new(
        &config.espn.base_url,
        config.league.league_id,
        config.league.season,
        &auth,
        timeout,
    )
    .context("failed to build ESPN client")?;
    let sinks = build_sinks(&config, &args.config_dir, timeout)?;

    // 6. Run once
    let app = App::new(
        db,
        Box::new(stats),
        Box::new(espn),
        sinks,
        RunSettings::from_config(&config),
    );
    let outcome = match app.run(opts).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Run failed: {e:#}");
            return Err(e);
        }
    };

    info!(
        games = outcome.games,
        merged = outcome.merge.is_some(),
        probable_pitchers = outcome.report.probable_pitchers.len(),
        probable_batters = outcome.report.probable_batters.len(),
        delivery_failures = outcome.delivery_failures,
        "waiver-wire finished"
    );
    Ok(())
}

fn run_options(args: &Args) -> Result<RunOptions> {
    let game_date = match args.date {
        Some(date) => date,
        None => Local::now()
            .date_naive()
            .checked_sub_days(Days::new(1))
            .context("cannot compute yesterday's date")?,
    };
    let target_date = match args.target_date {
        Some(date) => date,
        None => game_date
            .checked_add_days(Days::new(1))
            .context("cannot compute target date")?,
    };
    Ok(RunOptions {
        game_date,
        target_date,
        force: args.force,
    })
}

/// Configured path, or `waiver-wire.db` in the platform data directory.
fn database_path(config: &Config) -> Result<String> {
    if let Some(path) = &config.database.path {
        return Ok(path.clone());
    }
    let dirs = ProjectDirs::from("", "", "waiver-wire")
        .context("no home directory to place the database in; set [database] path")?;
    let data_dir = dirs.data_dir();
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create {}", data_dir.display()))?;
    Ok(data_dir.join("waiver-wire.db").to_string_lossy().into_owned())
}

fn build_sinks(config: &Config, base_dir: &Path, timeout: Duration) -> Result<Vec<Box<dyn ReportSink>>> {
    let mut sinks: Vec<Box<dyn ReportSink>> = Vec::new();

    let output_dir = base_dir.join(&config.report.output_dir);
    sinks.push(Box::new(FileSink::new(output_dir)));

    if let Some(url) = &config.report.webhook_url {
        sinks.push(Box::new(WebhookSink::new(url.as_str(), timeout)?));
    }
    Ok(sinks)
}

/// Initialize tracing to append to `logs/waiver-wire.log`.
fn init_tracing(base_dir: &Path) -> Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = base_dir.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("waiver-wire.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("waiver_wire=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
