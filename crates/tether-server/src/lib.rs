//! Server wiring for Tether: runtime configuration and the top-level router.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use axum::Router;
use serde::Deserialize;
use tether_core::{
  service::{IdentityService, ServiceConfig},
  store::IdentityStore,
};
use tether_store_sqlite::StoreOptions;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `tether.toml` and
/// `TETHER_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                   String,
  #[serde(default = "default_port")]
  pub port:                   u16,
  #[serde(default = "default_store_path")]
  pub store_path:             PathBuf,
  /// Bound on one resolution, including the wait for its keys.
  #[serde(default = "default_transaction_timeout_ms")]
  pub transaction_timeout_ms: u64,
  /// How long SQLite waits on a lock held by another process.
  #[serde(default = "default_busy_timeout_ms")]
  pub busy_timeout_ms:        u64,
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 3000 }
fn default_store_path() -> PathBuf { PathBuf::from("tether.db") }
fn default_transaction_timeout_ms() -> u64 { 5_000 }
fn default_busy_timeout_ms() -> u64 { 2_000 }

impl ServerConfig {
  /// Layer the optional TOML file at `path` under `TETHER_*` environment
  /// variables.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path.to_path_buf()).required(false))
      .add_source(config::Environment::with_prefix("TETHER").try_parsing(true))
      .build()?
      .try_deserialize()
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn service_config(&self) -> ServiceConfig {
    ServiceConfig {
      transaction_timeout: Duration::from_millis(self.transaction_timeout_ms),
    }
  }

  pub fn store_options(&self) -> StoreOptions {
    StoreOptions { busy_timeout: Duration::from_millis(self.busy_timeout_ms) }
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The full HTTP application: the JSON API with request tracing.
pub fn router<S>(service: Arc<IdentityService<S>>) -> Router
where
  S: IdentityStore + 'static,
{
  tether_api::api_router(service).layer(TraceLayer::new_for_http())
}
