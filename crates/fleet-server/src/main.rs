//! fleetd: the fleet management server binary.
//!
//! Reads `fleet.toml` (or the path given with `--config`) layered with
//! `FLEET_*` environment variables, opens the SQLite store, and either serves
//! the HTTP API or runs a single auto-assignment batch.
//!
//! ```text
//! fleetd --config /etc/fleet.toml serve
//! FLEET_ASSIGNER__MAX_CLAIM_ATTEMPTS=5 fleetd auto-assign
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use fleet_api::ApiState;
use fleet_core::assign::AutoAssigner;
use fleet_server::ServerConfig;
use fleet_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Fleet management server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "fleet.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Default)]
enum Command {
  /// Serve the HTTP API (the default).
  #[default]
  Serve,
  /// Run one auto-assignment batch, print the outcomes as JSON, and exit.
  AutoAssign,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("FLEET")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true),
    )
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let store = Arc::new(store);

  match cli.command.unwrap_or_default() {
    Command::Serve => serve(store, server_cfg).await,
    Command::AutoAssign => auto_assign(store, server_cfg).await,
  }
}

async fn serve(store: Arc<SqliteStore>, cfg: ServerConfig) -> anyhow::Result<()> {
  let state = ApiState::new(store, cfg.assigner.clone(), cfg.license_alert_days);
  let app = fleet_server::router(state);
  let address = cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;
  Ok(())
}

async fn auto_assign(
  store: Arc<SqliteStore>,
  cfg: ServerConfig,
) -> anyhow::Result<()> {
  let assigner = AutoAssigner::new(store, cfg.assigner);
  let results = assigner
    .run_auto_assignment()
    .await
    .context("auto-assignment batch failed")?;

  let out = serde_json::to_string_pretty(&serde_json::json!({ "results": results }))
    .context("failed to encode outcomes")?;
  println!("{out}");
  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
