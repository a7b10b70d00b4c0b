//! Handler for `POST /identify`.
//!
//! Body: `{"email": "...", "phoneNumber": "..."}`; either field may be null or
//! omitted, but not both. `phoneNumber` may also be sent as a JSON number.

use std::sync::Arc;

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tether_core::{
  consolidate::ConsolidatedContact,
  observation::Observation,
  service::IdentityService,
  store::IdentityStore,
};

use crate::error::ApiError;

/// A phone number as clients send it.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PhoneInput {
  Text(String),
  Number(serde_json::Number),
}

impl From<PhoneInput> for String {
  fn from(p: PhoneInput) -> Self {
    match p {
      PhoneInput::Text(s) => s,
      PhoneInput::Number(n) => n.to_string(),
    }
  }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyBody {
  #[serde(default)]
  pub email:        Option<String>,
  #[serde(default)]
  pub phone_number: Option<PhoneInput>,
}

/// Response envelope shared by every endpoint returning an identity.
#[derive(Debug, Serialize, Deserialize)]
pub struct ContactEnvelope {
  pub contact: ConsolidatedContact,
}

/// `POST /identify`
pub async fn handler<S>(
  State(service): State<Arc<IdentityService<S>>>,
  Json(body): Json<IdentifyBody>,
) -> Result<Json<ContactEnvelope>, ApiError>
where
  S: IdentityStore + 'static,
{
  let observation = Observation::new(body.email, body.phone_number.map(String::from))?;
  let resolution = service.identify(observation).await?;
  Ok(Json(ContactEnvelope { contact: resolution.contact }))
}
