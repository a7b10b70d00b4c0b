//! Matcher — finds every stored contact sharing a field with an observation.
//!
//! Matching is exact and loose: a contact that shares only the email, or only
//! the phone number, is part of the matched set.

use crate::{contact::Contact, observation::Observation, store::ContactTx};

/// Fetch all contacts whose email or phone number equals the observation's.
pub fn find_matches<T: ContactTx>(
  tx: &mut T,
  observation: &Observation,
) -> Result<Vec<Contact>, T::Error> {
  tx.find_matching(observation.email(), observation.phone_number())
}

/// Whether some contact in `matched` already records the observation's exact
/// `(email, phone)` pair.
pub fn has_exact_pair(matched: &[Contact], observation: &Observation) -> bool {
  matched
    .iter()
    .any(|c| c.has_pair(observation.email(), observation.phone_number()))
}
