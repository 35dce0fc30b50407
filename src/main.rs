//! Stigmergy CLI entry point.
//!
//! The default subcommand is `hook`: read one JSON hook event from stdin,
//! dispatch it, and print exactly one JSON object on stdout. Diagnostics go
//! to stderr only; the hook path always exits 0.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use stigmergy::adapters::sqlite::{self, migrations};
use stigmergy::domain::models::{Config, HookEvent};
use stigmergy::services::{config as config_layers, HookDispatcher};

#[derive(Parser)]
#[command(
    name = "stigmergy",
    version,
    about = "Agent coordination runtime for coding-assistant CLI hooks"
)]
struct Cli {
    /// Coordination store DSN (overrides configuration)
    #[arg(long, env = "STIGMERGY_DATABASE__URL", global = true)]
    database_url: Option<String>,

    /// Load configuration from a specific file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Process one hook event from stdin (the default)
    Hook,
    /// Apply pending schema migrations and exit
    Migrate,
    /// Print the active sessions and feature workspaces of a project as JSON
    Sessions {
        /// Project to report on (defaults to the working directory's name)
        #[arg(long)]
        project: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => config_layers::load_from(path),
        None => config_layers::load(),
    }
    .unwrap_or_else(|err| {
        eprintln!("[stigmergy] configuration invalid, using defaults: {err:#}");
        Config::default()
    });
    if let Some(url) = cli.database_url {
        config.database.url = url;
    }

    init_tracing(&config);

    match cli.command.unwrap_or(Commands::Hook) {
        Commands::Hook => {
            run_hook(config).await;
            Ok(())
        }
        Commands::Migrate => {
            let pool = open_pool(&config).await?;
            let applied = migrations::apply_all(&pool)
                .await
                .context("Failed to apply migrations")?;
            println!("{}", json!({ "applied": applied }));
            Ok(())
        }
        Commands::Sessions { project } => {
            let pool = open_pool(&config).await?;
            migrations::apply_all(&pool)
                .await
                .context("Failed to apply migrations")?;
            let project = project.unwrap_or_else(resolve_project);
            let dispatcher = HookDispatcher::from_pool(pool, config, project.clone());

            let sessions = dispatcher
                .supervisor()
                .list_active(Some(&project))
                .await
                .context("Failed to list sessions")?;
            let workspaces = dispatcher
                .supervisor()
                .workspaces(&project)
                .await
                .context("Failed to list workspaces")?;
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "project": project,
                    "sessions": sessions,
                    "workspaces": workspaces,
                }))?
            );
            Ok(())
        }
    }
}

/// The hook path: one event in, one JSON object out, exit 0 regardless.
async fn run_hook(config: Config) {
    let output = match process_event(&config).await {
        Ok(output) => output,
        Err(err) => {
            // Transient or validation trouble; the host sees a no-op.
            error!(error = %format!("{err:#}"), "hook degraded to no-op");
            json!({})
        }
    };
    println!("{output}");
}

async fn process_event(config: &Config) -> Result<Value> {
    let line = read_event_line(Duration::from_secs(config.limits.stdin_timeout_secs)).await?;
    let event: HookEvent =
        serde_json::from_str(&line).context("hook body is not a valid event")?;

    let pool = open_pool(config).await?;
    migrations::apply_all(&pool)
        .await
        .context("schema migration failed")?;

    let dispatcher = HookDispatcher::from_pool(pool, config.clone(), resolve_project());
    let decision = dispatcher.dispatch(&event).await;
    Ok(decision.to_json(event.hook_event_name))
}

/// Read the single-line JSON body within the stdin budget.
async fn read_event_line(budget: Duration) -> Result<String> {
    let mut reader = BufReader::new(tokio::io::stdin());
    let mut line = String::new();

    let read = tokio::time::timeout(budget, reader.read_line(&mut line))
        .await
        .context("timed out reading hook body from stdin")?;
    read.context("failed to read hook body from stdin")?;

    let line = line.trim().to_string();
    if line.is_empty() {
        anyhow::bail!("empty hook body");
    }
    Ok(line)
}

async fn open_pool(config: &Config) -> Result<sqlx::SqlitePool> {
    sqlite::open(&config.database)
        .await
        .context("failed to open coordination store")
}

/// Project identity for sessions and claims: explicit override, else the
/// working directory's name.
fn resolve_project() -> String {
    if let Ok(project) = std::env::var("STIGMERGY_PROJECT") {
        if !project.is_empty() {
            return project;
        }
    }
    std::env::current_dir()
        .ok()
        .and_then(|dir| dir.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "default".to_string())
}

/// Diagnostics on stderr; stdout belongs to the hook protocol.
fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    let result = if config.logging.format == "json" {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };
    if result.is_err() {
        warn!("tracing subscriber already initialized");
    }
}
