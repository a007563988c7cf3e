//! Mind Daemon - progress, energy and reward service for MIND DEVS
//!
//! Serves the learner state machine over HTTP and manages lesson content.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mind_common::db::MindDb;
use mind_common::notify::{LogNotifier, Notifier, WebhookNotifier};
use mind_common::{Lesson, ProgressService};
use mindd::config::Config;
use mindd::server::{self, AppState};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mindd", version, about = "MIND DEVS progress service")]
struct Cli {
    /// Config file (default: /etc/mind-devs/mindd.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the listen address
    #[arg(long, global = true)]
    listen: Option<String>,

    /// Override the database path
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Load lessons from a JSON array file
    ImportLessons { file: PathBuf },
    /// Write a config file with every default filled in
    InitConfig { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    if let Some(Command::InitConfig { path }) = &cli.command {
        return Config::save_default(path);
    }

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(listen) = cli.listen {
        config.server.listen = listen;
    }
    if let Some(db) = cli.db {
        config.database.path = db;
    }

    let db = MindDb::open(config.database.path.clone(), config.database.busy_timeout())
        .await
        .context("Failed to open database")?;
    let service = ProgressService::new(Arc::new(db), notifier(&config), config.notify.service_settings());

    match cli.command {
        Some(Command::ImportLessons { file }) => import_lessons(&service, &file).await,
        Some(Command::InitConfig { .. }) => Ok(()),
        Some(Command::Serve) | None => {
            info!("Mind Daemon v{} starting", env!("CARGO_PKG_VERSION"));
            server::run(AppState::new(service), &config).await
        }
    }
}

fn notifier(config: &Config) -> Arc<dyn Notifier> {
    if config.notify.uses_webhook() {
        info!("Notifications go to {}", config.notify.webhook_url);
        Arc::new(WebhookNotifier::new(
            &config.notify.webhook_url,
            Duration::from_secs(config.notify.timeout_secs),
        ))
    } else {
        info!("No notification relay configured, logging notifications only");
        Arc::new(LogNotifier)
    }
}

async fn import_lessons(service: &ProgressService, file: &Path) -> Result<()> {
    let content = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let lessons: Vec<Lesson> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse lessons in {}", file.display()))?;

    let count = service.import_lessons(lessons).await?;
    println!("Imported {} lesson(s) from {}", count, file.display());
    Ok(())
}
