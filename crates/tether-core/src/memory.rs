//! In-memory storage backend.
//!
//! A reference implementation of [`IdentityStore`] for embedding and tests.
//! Each unit of work runs against a private copy of the state that replaces
//! the shared state only when the work succeeds.

use std::{sync::Mutex, time::Instant};

use chrono::{DateTime, Utc};

use crate::{
  Error, Result,
  consolidate::{self, ConsolidatedContact},
  contact::{Contact, ContactId, LinkPrecedence, NewContact},
  observation::Observation,
  resolver::{self, Resolution},
  store::{ContactTx, IdentityStore},
};

fn lock_err() -> Error { Error::Store("poisoned lock: memory store".into()) }

#[derive(Debug, Clone)]
struct State {
  contacts: Vec<Contact>,
  next_id:  i64,
}

impl Default for State {
  fn default() -> Self { Self { contacts: Vec::new(), next_id: 1 } }
}

// ─── Store ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryStore {
  state: Mutex<State>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  /// Run `work` as one transaction. Its changes become visible only if it
  /// returns `Ok`.
  pub fn transaction<R>(
    &self,
    work: impl FnOnce(&mut MemoryTx<'_>) -> Result<R>,
  ) -> Result<R> {
    self.transaction_until(None, work)
  }

  /// Like [`MemoryStore::transaction`], but discards the work instead of
  /// committing it once `deadline` has passed.
  pub fn transaction_until<R>(
    &self,
    deadline: Option<Instant>,
    work: impl FnOnce(&mut MemoryTx<'_>) -> Result<R>,
  ) -> Result<R> {
    let started = Instant::now();
    let mut shared = self.state.lock().map_err(|_| lock_err())?;
    let mut working = shared.clone();
    let out = work(&mut MemoryTx { state: &mut working })?;
    if deadline.is_some_and(|d| Instant::now() >= d) {
      return Err(Error::Timeout(started.elapsed()));
    }
    *shared = working;
    Ok(out)
  }

  /// Every live contact, in id order.
  pub fn snapshot(&self) -> Result<Vec<Contact>> {
    let state = self.state.lock().map_err(|_| lock_err())?;
    Ok(
      state
        .contacts
        .iter()
        .filter(|c| c.deleted_at.is_none())
        .cloned()
        .collect(),
    )
  }
}

impl IdentityStore for MemoryStore {
  type Error = Error;

  async fn identify(
    &self,
    observation: Observation,
    deadline: Option<Instant>,
  ) -> Result<Resolution> {
    self.transaction_until(deadline, |tx| {
      resolver::resolve(tx, &observation, Utc::now())
    })
  }

  async fn consolidated(&self, id: ContactId) -> Result<Option<ConsolidatedContact>> {
    self.transaction(|tx| consolidate::view_of(tx, id))
  }

  async fn get_contact(&self, id: ContactId) -> Result<Option<Contact>> {
    self.transaction(|tx| tx.get(id))
  }
}

// ─── Transaction ─────────────────────────────────────────────────────────────

/// A transaction over the working copy of a [`MemoryStore`].
pub struct MemoryTx<'a> {
  state: &'a mut State,
}

impl MemoryTx<'_> {
  fn live(&self) -> impl Iterator<Item = &Contact> {
    self.state.contacts.iter().filter(|c| c.deleted_at.is_none())
  }

  fn live_mut(&mut self) -> impl Iterator<Item = &mut Contact> {
    self.state.contacts.iter_mut().filter(|c| c.deleted_at.is_none())
  }
}

impl ContactTx for MemoryTx<'_> {
  type Error = Error;

  fn find_matching(
    &mut self,
    email: Option<&str>,
    phone_number: Option<&str>,
  ) -> Result<Vec<Contact>> {
    Ok(
      self
        .live()
        .filter(|c| {
          (email.is_some() && c.email.as_deref() == email)
            || (phone_number.is_some() && c.phone_number.as_deref() == phone_number)
        })
        .cloned()
        .collect(),
    )
  }

  fn get(&mut self, id: ContactId) -> Result<Option<Contact>> {
    Ok(self.live().find(|c| c.id == id).cloned())
  }

  fn insert(&mut self, input: NewContact, now: DateTime<Utc>) -> Result<Contact> {
    let contact = Contact {
      id:              ContactId(self.state.next_id),
      email:           input.email,
      phone_number:    input.phone_number,
      linked_id:       input.linked_id,
      link_precedence: input.link_precedence,
      created_at:      now,
      updated_at:      now,
      deleted_at:      None,
    };
    self.state.next_id += 1;
    self.state.contacts.push(contact.clone());
    Ok(contact)
  }

  fn demote(
    &mut self,
    id: ContactId,
    primary: ContactId,
    now: DateTime<Utc>,
  ) -> Result<()> {
    let contact = self
      .live_mut()
      .find(|c| c.id == id)
      .ok_or(Error::ContactNotFound(id))?;
    contact.link_precedence = LinkPrecedence::Secondary;
    contact.linked_id = Some(primary);
    contact.updated_at = now;
    Ok(())
  }

  fn relink(
    &mut self,
    from: ContactId,
    to: ContactId,
    now: DateTime<Utc>,
  ) -> Result<usize> {
    let mut touched = 0;
    for contact in self.live_mut().filter(|c| c.linked_id == Some(from)) {
      contact.linked_id = Some(to);
      contact.updated_at = now;
      touched += 1;
    }
    Ok(touched)
  }

  fn cluster(&mut self, primary: ContactId) -> Result<Vec<Contact>> {
    Ok(
      self
        .live()
        .filter(|c| c.id == primary || c.linked_id == Some(primary))
        .cloned()
        .collect(),
    )
  }
}
