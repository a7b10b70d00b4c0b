//! tether server binary.
//!
//! Reads `tether.toml` (or the path specified with `--config`), opens the
//! SQLite contact store, and serves the identity API over HTTP.
//!
//! # Schema setup
//!
//! The schema is applied whenever the store is opened. To create or upgrade a
//! database file without starting the server:
//!
//! ```
//! cargo run -p tether-server --bin tether -- --init-schema
//! ```

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use tether_core::service::IdentityService;
use tether_server::{ServerConfig, expand_tilde};
use tether_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Tether identity reconciliation server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "tether.toml")]
  config: PathBuf,

  /// Create or upgrade the database schema and exit.
  #[arg(long)]
  init_schema: bool,
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

  let server_cfg = ServerConfig::load(&cli.config)
    .with_context(|| format!("failed to load config from {:?}", cli.config))?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open_with(&store_path, server_cfg.store_options())
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  if cli.init_schema {
    let version = store.schema_version().await.context("failed to read schema version")?;
    tracing::info!(path = ?store_path, version, "schema ready");
    return Ok(());
  }

  let service = Arc::new(IdentityService::new(
    Arc::new(store),
    server_cfg.service_config(),
  ));
  let app = tether_server::router(service);
  let address = server_cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  tracing::info!("shut down");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::warn!(error = %e, "failed to listen for ctrl-c");
    std::future::pending::<()>().await;
  }
}
