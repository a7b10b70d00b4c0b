//! Error types for `tether-core`.

use std::time::Duration;

use thiserror::Error;

use crate::contact::ContactId;

#[derive(Debug, Error)]
pub enum Error {
  /// Neither an email nor a phone number was supplied.
  #[error("at least one of email or phoneNumber must be provided")]
  MissingContactPoint,

  #[error("contact not found: {0}")]
  ContactNotFound(ContactId),

  /// A secondary contact whose link does not lead to any stored primary.
  #[error("secondary contact {0} has no reachable primary")]
  DanglingLink(ContactId),

  #[error("link chain starting at contact {0} does not terminate")]
  LinkCycle(ContactId),

  /// The unit of work missed its deadline, either waiting for its keys or
  /// before the store could commit. Nothing was written; the caller may
  /// retry.
  #[error("store transaction timed out after {0:?}")]
  Timeout(Duration),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Whether retrying the same request may succeed.
  pub fn is_retryable(&self) -> bool { matches!(self, Self::Timeout(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
