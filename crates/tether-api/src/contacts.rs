//! Handler for `GET /contacts/{id}` — the consolidated identity containing a
//! contact, without recording anything.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use tether_core::{contact::ContactId, service::IdentityService, store::IdentityStore};

use crate::{error::ApiError, identify::ContactEnvelope};

/// `GET /contacts/{id}` — 404 if no such contact exists.
pub async fn get_one<S>(
  State(service): State<Arc<IdentityService<S>>>,
  Path(id): Path<i64>,
) -> Result<Json<ContactEnvelope>, ApiError>
where
  S: IdentityStore + 'static,
{
  let contact = service
    .consolidated(ContactId(id))
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("contact {id} not found")))?;
  Ok(Json(ContactEnvelope { contact }))
}
