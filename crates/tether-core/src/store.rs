//! Storage seams.
//!
//! [`ContactTx`] is the synchronous, transaction-scoped view the
//! reconciliation algorithm runs against. [`IdentityStore`] is the async
//! abstraction higher layers (`tether-api`, the server binary) depend on; each
//! of its methods is one atomic unit of work.

use std::{future::Future, time::Instant};

use chrono::{DateTime, Utc};

use crate::{
  consolidate::ConsolidatedContact,
  contact::{Contact, ContactId, NewContact},
  observation::Observation,
  resolver::Resolution,
};

// ─── Transaction seam ────────────────────────────────────────────────────────

/// Operations available inside one open store transaction.
///
/// Implementations must never expose rows with a non-null `deleted_at`.
/// Nothing done through a `ContactTx` is visible to other units of work until
/// the owning store commits it.
pub trait ContactTx {
  /// Store error; must be able to carry the core integrity errors raised
  /// while walking links.
  type Error: From<crate::Error>;

  /// Every contact whose email equals `email` or whose phone number equals
  /// `phone_number`. An absent argument matches nothing.
  fn find_matching(
    &mut self,
    email: Option<&str>,
    phone_number: Option<&str>,
  ) -> Result<Vec<Contact>, Self::Error>;

  fn get(&mut self, id: ContactId) -> Result<Option<Contact>, Self::Error>;

  /// Persist a new contact, assigning the next id and both timestamps.
  fn insert(
    &mut self,
    input: NewContact,
    now: DateTime<Utc>,
  ) -> Result<Contact, Self::Error>;

  /// Turn `id` into a secondary of `primary`.
  fn demote(
    &mut self,
    id: ContactId,
    primary: ContactId,
    now: DateTime<Utc>,
  ) -> Result<(), Self::Error>;

  /// Re-point every contact linked to `from` at `to`. Returns the number of
  /// contacts touched.
  fn relink(
    &mut self,
    from: ContactId,
    to: ContactId,
    now: DateTime<Utc>,
  ) -> Result<usize, Self::Error>;

  /// The contact `primary` plus every contact linked directly to it, in id
  /// order.
  fn cluster(&mut self, primary: ContactId) -> Result<Vec<Contact>, Self::Error>;
}

// ─── Async store ─────────────────────────────────────────────────────────────

/// Abstraction over a Tether contact store backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait IdentityStore: Send + Sync {
  /// Store error. Converting it into a core [`crate::Error`] must map a
  /// missed deadline to [`crate::Error::Timeout`].
  type Error: std::error::Error + Send + Sync + Into<crate::Error> + 'static;

  /// Reconcile `observation` against the store and return the consolidated
  /// identity. Matching, merging, appending and the final read run as one
  /// transaction: either every mutation commits or none does.
  ///
  /// If `deadline` has passed by the time the transaction would commit, it
  /// is rolled back and a timeout error is returned instead.
  fn identify(
    &self,
    observation: Observation,
    deadline: Option<Instant>,
  ) -> impl Future<Output = Result<Resolution, Self::Error>> + Send + '_;

  /// The consolidated view of the cluster containing `id`, which may be any
  /// member. Returns `None` if no such contact exists.
  fn consolidated(
    &self,
    id: ContactId,
  ) -> impl Future<Output = Result<Option<ConsolidatedContact>, Self::Error>> + Send + '_;

  /// Retrieve a single contact by id. Returns `None` if not found.
  fn get_contact(
    &self,
    id: ContactId,
  ) -> impl Future<Output = Result<Option<Contact>, Self::Error>> + Send + '_;
}
