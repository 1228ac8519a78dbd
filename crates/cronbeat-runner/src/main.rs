use std::sync::Arc;

use clap::Parser;
use cronbeat_core::{CronbeatConfig, Job};
use cronbeat_engine::{handler_fn, CronConfig, CronEngine};
use cronbeat_store::{JobStore, SqliteStore};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(
    name = "cronbeat-runner",
    about = "Run one cronbeat scheduler instance against a shared SQLite store"
)]
struct Args {
    /// Path to cronbeat.toml (default: ~/.cronbeat/cronbeat.toml).
    #[arg(long)]
    config: Option<String>,

    /// Override the database path from the config file.
    #[arg(long)]
    db: Option<String>,

    /// Insert an every-second demo job before starting.
    #[arg(long)]
    seed_demo: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "cronbeat_runner=info,cronbeat_engine=info,cronbeat_store=info".into()
            }),
        )
        .init();

    let args = Args::parse();

    // load config: explicit flag > CRONBEAT_CONFIG env > ~/.cronbeat/cronbeat.toml
    let config_path = args
        .config
        .clone()
        .or_else(|| std::env::var("CRONBEAT_CONFIG").ok());
    let config = CronbeatConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({e}), using defaults");
        CronbeatConfig::default()
    });

    let db_path = args.db.unwrap_or_else(|| config.database.path.clone());
    ensure_parent_dir(&db_path);
    info!(path = %db_path, "opening SQLite database");

    let conn = rusqlite::Connection::open(&db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    let store = Arc::new(SqliteStore::new(conn)?);

    if args.seed_demo {
        let job = store
            .insert(
                Job::new(
                    "demo-reminder",
                    serde_json::json!({"message": "remind me every 1s"}),
                )
                .with_interval("* * * * * *"),
            )
            .await?;
        info!(job_id = %job.id, "demo job seeded");
    }

    let handler = Arc::new(handler_fn(|job: Job| async move {
        info!(job_id = %job.id, name = %job.name, payload = %job.payload, "processing job");
        Ok(())
    }));

    let engine = CronEngine::new(store, handler, CronConfig::from(&config.engine));
    engine.start(None);
    info!("scheduler running, press ctrl-c to stop");

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    engine.shutdown().await;
    Ok(())
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }
}
