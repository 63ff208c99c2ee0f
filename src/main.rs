use std::sync::Arc;

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use release_watcher::cells::{CURRENT_RELEASE, CURRENT_RELEASE_DATE, CellStore, SetOutcome};
use release_watcher::config::AppConfig;
use release_watcher::github::{GitHubClient, GitHubSource, RetryConfig};
use release_watcher::persistence::FileMirror;
use release_watcher::server::{AppState, build_router};
use release_watcher::store::StoreBackend;
use release_watcher::types::ReleaseId;
use release_watcher::watcher::{
    CheckOutcome, ManualScheduler, RecoveryOutcome, ReleaseWatcher, Scheduler, TokioScheduler,
    recover_pending,
};

/// Watches nightly releases and publishes them to the site once every
/// artifact is uploaded.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the webhook and site-state endpoints (default).
    Serve,

    /// Check one release now and finalize it if complete.
    Check {
        release_id: u64,

        /// Add the release to the pending set first, unless it was already
        /// finalized.
        #[arg(long)]
        register: bool,
    },

    /// Set the current stable release shown on the site.
    Promote {
        version: String,

        /// Release date (YYYY-MM-DD); defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_file_loaded = dotenvy::dotenv().is_ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "release_watcher=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if env_file_loaded {
        info!("loaded .env file");
    }

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("invalid configuration")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Check {
            release_id,
            register,
        } => check(config, ReleaseId(release_id), register).await,
        Command::Promote { version, date } => promote(config, version, date).await,
    }
}

async fn open_cells(config: &AppConfig) -> anyhow::Result<CellStore<StoreBackend>> {
    let store = StoreBackend::connect(config.redis_url.as_deref())
        .await
        .context("cannot connect to keyed store")?;
    let mirror = FileMirror::open(&config.mirror_path)
        .with_context(|| format!("cannot open mirror {}", config.mirror_path.display()))?;
    let cells = CellStore::new(store, Arc::new(mirror));
    cells.bootstrap().await.context("cannot initialize site cells")?;
    Ok(cells)
}

fn github_source(config: &AppConfig) -> anyhow::Result<GitHubSource> {
    if config.github_token.is_none() {
        warn!("GITHUB_TOKEN not set; using anonymous API access");
    }
    let client = GitHubClient::from_token(config.github_token.clone(), config.repo.clone())
        .context("cannot build GitHub client")?;
    GitHubSource::new(client, RetryConfig::DEFAULT).context("cannot build HTTP client")
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let secret = config.require_webhook_secret()?;
    let cells = open_cells(&config).await?;
    let source = github_source(&config)?;

    let shutdown = CancellationToken::new();
    let scheduler = Arc::new(TokioScheduler::new(shutdown.clone()));
    let watcher = ReleaseWatcher::new(cells, source, scheduler.clone(), config.watch.clone());

    match recover_pending(&watcher).await {
        Ok(RecoveryOutcome::NotLeader) => {}
        Ok(RecoveryOutcome::Recovered {
            pending,
            rearmed,
            failed,
        }) => info!(pending, rearmed, failed, "recovered pending releases"),
        // Pending releases are re-armed by the next restart that wins the
        // election.
        Err(e) => error!(error = %e, "recovery of pending releases failed"),
    }

    let app = build_router(AppState::new(watcher, secret, config.webhook_log.clone()));
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("cannot bind {}", config.bind))?;
    info!(addr = %config.bind, repo = %config.repo, "listening");

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "cannot listen for Ctrl-C");
            }
            info!("shutting down");
            signal.cancel();
        })
        .await
        .context("server error")?;

    scheduler.close().await;
    Ok(())
}

async fn check(config: AppConfig, id: ReleaseId, register: bool) -> anyhow::Result<()> {
    let cells = open_cells(&config).await?;
    let source = github_source(&config)?;
    // A one-shot check never schedules a follow-up.
    let scheduler: Arc<dyn Scheduler> = Arc::new(ManualScheduler::new());
    let watcher = ReleaseWatcher::new(cells, source, scheduler, config.watch.clone());

    if register && watcher.register(id).await? {
        println!("registered release {id}");
    }

    match watcher.check(id).await {
        CheckOutcome::Finalized { version } => println!("release {id} finalized as {version}"),
        CheckOutcome::AlreadyFinalized => {
            println!("release {id} is not pending; nothing to do")
        }
        CheckOutcome::Incomplete { missing } => {
            let labels: Vec<_> = missing.iter().map(|r| r.label()).collect();
            println!("release {id} still missing: {}", labels.join(", "));
        }
        CheckOutcome::Failed => anyhow::bail!("check of release {id} failed; see log"),
    }
    Ok(())
}

async fn promote(config: AppConfig, version: String, date: Option<NaiveDate>) -> anyhow::Result<()> {
    let cells = open_cells(&config).await?;
    let date = date
        .unwrap_or_else(|| Local::now().date_naive())
        .format("%Y-%m-%d")
        .to_string();

    if cells.write(&CURRENT_RELEASE, &version).await? == SetOutcome::Rejected {
        anyhow::bail!("refusing to set an empty current release");
    }
    cells.write(&CURRENT_RELEASE_DATE, &date).await?;
    println!("current release is now {version} ({date})");
    Ok(())
}
