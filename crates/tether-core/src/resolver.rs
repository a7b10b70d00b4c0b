//! Merge Resolver — the reconciliation algorithm.
//!
//! Given an observation, either:
//!
//! - start a new identity (nothing matched),
//! - merge every cluster the observation touches into the one whose primary
//!   was created first, and/or
//! - append the observation as a new secondary contact point when its exact
//!   `(email, phone)` pair is not yet recorded.
//!
//! Everything here runs inside one [`ContactTx`]; atomicity is the store's
//! job.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
  Error,
  consolidate::{self, ConsolidatedContact},
  contact::{Contact, ContactId, NewContact},
  matcher,
  observation::Observation,
  store::ContactTx,
};

/// Upper bound on link hops followed while looking for a cluster's primary.
/// Clusters written by this resolver are one hop deep; the bound only guards
/// against corrupt chains.
pub const MAX_LINK_HOPS: usize = 64;

// ─── Result types ────────────────────────────────────────────────────────────

/// What a resolution did to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
  /// Nothing matched; a new primary was created.
  Created,
  /// A new secondary was added to a single existing cluster.
  Appended,
  /// Two or more clusters were merged. `demoted` lists the former primaries,
  /// in the order they were demoted.
  Merged {
    demoted:  Vec<ContactId>,
    appended: bool,
  },
  /// The observation was already fully recorded.
  Unchanged,
}

/// The consolidated identity together with what it took to produce it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
  pub contact: ConsolidatedContact,
  pub outcome: Outcome,
}

// ─── Algorithm ───────────────────────────────────────────────────────────────

/// Reconcile `observation` against the contacts visible through `tx`.
pub fn resolve<T: ContactTx>(
  tx: &mut T,
  observation: &Observation,
  now: DateTime<Utc>,
) -> Result<Resolution, T::Error> {
  let matched = matcher::find_matches(tx, observation)?;

  let Some((canonical, others)) = partition_primaries(tx, &matched)? else {
    let created = tx.insert(NewContact::primary(observation), now)?;
    let contact = consolidate::build(tx, created.id)?;
    return Ok(Resolution { contact, outcome: Outcome::Created });
  };

  // Fold every other cluster into the canonical one, keeping links one hop
  // deep: the demoted primary's own secondaries move with it.
  let mut demoted = Vec::with_capacity(others.len());
  for other in &others {
    tx.demote(other.id, canonical.id, now)?;
    tx.relink(other.id, canonical.id, now)?;
    demoted.push(other.id);
  }

  let appended = !matcher::has_exact_pair(&matched, observation);
  if appended {
    tx.insert(NewContact::secondary(observation, canonical.id), now)?;
  }

  let contact = consolidate::build(tx, canonical.id)?;
  let outcome = match (demoted.is_empty(), appended) {
    (true, true) => Outcome::Appended,
    (true, false) => Outcome::Unchanged,
    (false, appended) => Outcome::Merged { demoted, appended },
  };

  Ok(Resolution { contact, outcome })
}

/// Collect the primaries of every cluster touched by `matched` and split off
/// the canonical one: earliest `created_at`, lowest id on a tie.
///
/// Returns `None` when `matched` is empty.
fn partition_primaries<T: ContactTx>(
  tx: &mut T,
  matched: &[Contact],
) -> Result<Option<(Contact, Vec<Contact>)>, T::Error> {
  let mut primaries: BTreeMap<ContactId, Contact> = BTreeMap::new();
  for contact in matched {
    if primaries.contains_key(&contact.id) {
      continue;
    }
    let root = if contact.is_primary() {
      contact.clone()
    } else if let Some(root) = contact.linked_id.and_then(|id| primaries.get(&id)) {
      root.clone()
    } else {
      find_primary(tx, contact)?
    };
    primaries.entry(root.id).or_insert(root);
  }

  let mut primaries: Vec<Contact> = primaries.into_values().collect();
  primaries.sort_by_key(|c| (c.created_at, c.id));

  let mut primaries = primaries.into_iter();
  Ok(primaries.next().map(|canonical| (canonical, primaries.collect())))
}

/// Follow links from `start` until a primary is reached.
pub fn find_primary<T: ContactTx>(
  tx: &mut T,
  start: &Contact,
) -> Result<Contact, T::Error> {
  let mut current = start.clone();
  for _ in 0..MAX_LINK_HOPS {
    if current.is_primary() {
      return Ok(current);
    }
    let next = current.linked_id.ok_or(Error::DanglingLink(current.id))?;
    current = tx.get(next)?.ok_or(Error::DanglingLink(current.id))?;
  }
  Err(Error::LinkCycle(start.id).into())
}
