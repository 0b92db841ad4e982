use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use follower_outreach::config::Config;
use follower_outreach::engine::RunLock;
use follower_outreach::pipeline::Pipeline;
use follower_outreach::report::{self, ExportKind};
use follower_outreach::scheduler::Scheduler;
use follower_outreach::store::Store;
use follower_outreach::twitter::auth::TwitterAuth;
use follower_outreach::twitter::rest::TwitterRest;
use follower_outreach::twitter::SocialApi;
use follower_outreach::tui;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const LOG_FILE: &str = "follower-outreach.log";

#[derive(Parser)]
#[command(
    name = "follower-outreach",
    about = "Discover followers and send each an onboarding message"
)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run on the configured schedule until Ctrl-C.
    Run,
    /// Execute a single run and exit.
    Once,
    /// Print follower and message statistics.
    Stats,
    /// Export stored records as CSV.
    Export {
        #[arg(value_enum)]
        kind: ExportKind,
        output: PathBuf,
    },
    /// Live statistics dashboard.
    Dashboard {
        /// Seconds between store refreshes.
        #[arg(long, default_value_t = 5)]
        refresh_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let log_file = std::fs::File::create(LOG_FILE)
        .with_context(|| format!("Failed to create log file {}", LOG_FILE))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "follower_outreach=info".into()),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    Config::load_env_file();
    if matches!(cli.command, Command::Run | Command::Once) {
        config.validate()?;
    }

    let store = Arc::new(Store::open(&config.store.db_file)?);

    match cli.command {
        Command::Run => {
            let config = Arc::new(config);
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            let api = build_api(&config)?;
            let pipeline = Pipeline::new(api, store, config.clone(), shutdown_rx.clone());
            spawn_ctrl_c(shutdown_tx);

            let interval = Duration::from_secs(config.schedule.interval_hours * 3600);
            println!(
                "  Scheduling runs every {}h (logs: {})",
                config.schedule.interval_hours, LOG_FILE
            );
            Scheduler::new(pipeline, RunLock::new(), interval)
                .run(shutdown_rx)
                .await;
        }
        Command::Once => {
            let config = Arc::new(config);
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            let pipeline = Pipeline::new(build_api(&config)?, store, config, shutdown_rx);
            spawn_ctrl_c(shutdown_tx);

            let lock = RunLock::new();
            let Some(_token) = lock.try_acquire() else {
                anyhow::bail!("a run is already active");
            };
            let report = pipeline.run().await.context("run failed")?;
            println!(
                concat!(
                    "  Discovered {} ids, stored {} followers, {} candidates,",
                    " {} first + {} retry messages sent, {} refused"
                ),
                report.discovery.ids.len(),
                report.enrichment.inserted,
                report.candidates,
                report.sends.first_sent,
                report.sends.retries_sent,
                report.sends.refused,
            );
        }
        Command::Stats => {
            let overall = overall_followers(&config).await;
            let stats = report::stats(&store, overall)?;
            let overall = stats
                .overall_followers
                .map_or_else(|| "n/a".to_string(), |n| n.to_string());
            println!("  Overall Followers: {}", overall);
            println!("  Fetched Followers: {}", stats.fetched_followers);
            println!("  Skipped Followers: {}", stats.skipped_followers);
            println!("  DM Sent:           {}", stats.dm_sent);
            println!("  Retry DM Sent:     {}", stats.retry_dm_sent);
        }
        Command::Export { kind, output } => {
            let rows = report::export(&store, &config.filters, kind, &output)?;
            println!("  Wrote {} rows to {}", rows, output.display());
        }
        Command::Dashboard { refresh_secs } => {
            let overall = overall_followers(&config).await;
            tui::run_dashboard(&store, overall, Duration::from_secs(refresh_secs.max(1)))?;
        }
    }

    Ok(())
}

fn build_api(config: &Config) -> Result<Arc<dyn SocialApi>> {
    let credentials = Config::credentials()?;
    let auth = Arc::new(TwitterAuth::new(credentials));
    Ok(Arc::new(TwitterRest::new(auth, &config.twitter.api_base)?))
}

/// Best effort: reporting still works without credentials or connectivity.
async fn overall_followers(config: &Config) -> Option<u64> {
    let api = match build_api(config) {
        Ok(api) => api,
        Err(e) => {
            tracing::warn!("cannot query follower count: {:#}", e);
            return None;
        }
    };
    match api.follower_count().await {
        Ok(n) => Some(n),
        Err(e) => {
            tracing::warn!(error = %e, "follower count unavailable");
            None
        }
    }
}

fn spawn_ctrl_c(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Ctrl-C received, finishing current step");
            let _ = shutdown_tx.send(true);
        }
    });
}
