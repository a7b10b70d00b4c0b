//! Contact — the only persisted entity.
//!
//! Every contact point ever observed is one row. Rows sharing a primary form
//! an identity cluster; the primary is the cluster's canonical record and
//! every other member is a secondary linked to it.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::observation::Observation;

// ─── Identifiers ─────────────────────────────────────────────────────────────

/// Store-assigned, monotonically increasing contact identifier.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ContactId(pub i64);

impl fmt::Display for ContactId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl From<i64> for ContactId {
  fn from(id: i64) -> Self { Self(id) }
}

// ─── Precedence ──────────────────────────────────────────────────────────────

/// Position of a contact within its cluster.
///
/// The only transition is `Primary → Secondary`, taken when two clusters
/// merge. A secondary is never promoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkPrecedence {
  Primary,
  Secondary,
}

impl LinkPrecedence {
  /// The string stored in the `link_precedence` column.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Primary => "primary",
      Self::Secondary => "secondary",
    }
  }
}

// ─── Contact ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
  pub id:              ContactId,
  pub email:           Option<String>,
  pub phone_number:    Option<String>,
  /// Set only on secondaries; points at the cluster's primary.
  pub linked_id:       Option<ContactId>,
  pub link_precedence: LinkPrecedence,
  pub created_at:      DateTime<Utc>,
  /// Refreshed on every mutation.
  pub updated_at:      DateTime<Utc>,
  /// Reserved for soft deletion. Never written; rows carrying it are
  /// invisible to every read.
  pub deleted_at:      Option<DateTime<Utc>>,
}

impl Contact {
  pub fn is_primary(&self) -> bool {
    self.link_precedence == LinkPrecedence::Primary
  }

  /// Whether this contact records exactly the given `(email, phone)` pair.
  /// An absent value only equals an absent value.
  pub fn has_pair(&self, email: Option<&str>, phone_number: Option<&str>) -> bool {
    self.email.as_deref() == email && self.phone_number.as_deref() == phone_number
  }
}

// ─── NewContact ──────────────────────────────────────────────────────────────

/// Input to [`crate::store::ContactTx::insert`]. The id and timestamps are
/// assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContact {
  pub email:           Option<String>,
  pub phone_number:    Option<String>,
  pub linked_id:       Option<ContactId>,
  pub link_precedence: LinkPrecedence,
}

impl NewContact {
  /// A fresh identity rooted at the observation.
  pub fn primary(observation: &Observation) -> Self {
    Self {
      email:           observation.email().map(str::to_owned),
      phone_number:    observation.phone_number().map(str::to_owned),
      linked_id:       None,
      link_precedence: LinkPrecedence::Primary,
    }
  }

  /// A new contact point for the cluster rooted at `primary`.
  pub fn secondary(observation: &Observation, primary: ContactId) -> Self {
    Self {
      linked_id: Some(primary),
      link_precedence: LinkPrecedence::Secondary,
      ..Self::primary(observation)
    }
  }
}
