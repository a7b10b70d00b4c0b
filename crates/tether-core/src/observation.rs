//! Observation — one `(email, phone)` sighting to reconcile.

use crate::{Error, Result};

/// A validated observation. At least one field is always present; the only
/// way to build one is [`Observation::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
  email:        Option<String>,
  phone_number: Option<String>,
}

impl Observation {
  /// Build an observation, treating blank strings as absent.
  ///
  /// Values are otherwise kept verbatim: matching is exact.
  pub fn new(email: Option<String>, phone_number: Option<String>) -> Result<Self> {
    let email = email.filter(|s| !s.trim().is_empty());
    let phone_number = phone_number.filter(|s| !s.trim().is_empty());

    if email.is_none() && phone_number.is_none() {
      return Err(Error::MissingContactPoint);
    }
    Ok(Self { email, phone_number })
  }

  pub fn email(&self) -> Option<&str> { self.email.as_deref() }

  pub fn phone_number(&self) -> Option<&str> { self.phone_number.as_deref() }

  /// Serialization keys for this observation, sorted and deduplicated.
  ///
  /// Keys are coarser than matching (case-folded email, digits-only phone):
  /// two observations that could touch the same rows always share a key.
  pub fn lock_keys(&self) -> Vec<String> {
    let mut keys = Vec::with_capacity(2);
    if let Some(email) = self.email() {
      keys.push(format!("email:{}", email.trim().to_lowercase()));
    }
    if let Some(phone) = self.phone_number() {
      let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
      if digits.is_empty() {
        keys.push(format!("phone:{}", phone.trim()));
      } else {
        keys.push(format!("phone:{digits}"));
      }
    }
    keys.sort();
    keys.dedup();
    keys
  }
}
