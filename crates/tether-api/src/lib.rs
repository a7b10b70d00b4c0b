//! JSON REST API for Tether.
//!
//! Exposes an axum [`Router`] backed by an [`IdentityService`] over any
//! [`IdentityStore`]. TLS and transport concerns are the caller's
//! responsibility.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/identify` | Body: [`identify::IdentifyBody`]; returns the consolidated identity |
//! | `GET`  | `/contacts/{id}` | Consolidated identity containing contact `id`; 404 if unknown |

pub mod contacts;
pub mod error;
pub mod identify;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use tether_core::{service::IdentityService, store::IdentityStore};

pub use error::ApiError;

/// Build a fully-materialised API router for `service`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(service: Arc<IdentityService<S>>) -> Router<()>
where
  S: IdentityStore + 'static,
{
  Router::new()
    .route("/identify", post(identify::handler::<S>))
    .route("/contacts/{id}", get(contacts::get_one::<S>))
    .with_state(service)
}

// ─── Integration tests ────────────────────────────────────────────────────────
