//! [`IdentityService`] — the entry point transport layers call.
//!
//! Wraps an [`IdentityStore`] with per-key serialization and a bounded
//! transaction timeout, and logs what each resolution did.

use std::{
  sync::Arc,
  time::{Duration, Instant},
};

use crate::{
  Error, Result,
  consolidate::ConsolidatedContact,
  contact::ContactId,
  locks::KeyedLocks,
  observation::Observation,
  resolver::{Outcome, Resolution},
  store::IdentityStore,
};

/// Tunables for [`IdentityService`].
#[derive(Debug, Clone)]
pub struct ServiceConfig {
  /// Upper bound on waiting for the observation's keys plus running the store
  /// transaction.
  pub transaction_timeout: Duration,
}

impl Default for ServiceConfig {
  fn default() -> Self {
    Self { transaction_timeout: Duration::from_secs(5) }
  }
}

pub struct IdentityService<S> {
  store:  Arc<S>,
  locks:  KeyedLocks,
  config: ServiceConfig,
}

impl<S: IdentityStore> IdentityService<S> {
  pub fn new(store: Arc<S>, config: ServiceConfig) -> Self {
    Self { store, locks: KeyedLocks::new(), config }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  /// Reconcile one observation. See [`crate::resolver`] for the algorithm.
  ///
  /// The wait for the observation's keys and the store transaction share one
  /// deadline. Keys stay held until the store has finished, so a late commit
  /// can never race another resolution over the same keys. On
  /// [`Error::Timeout`] nothing was written and the request can be retried
  /// as-is.
  pub async fn identify(&self, observation: Observation) -> Result<Resolution> {
    let keys = observation.lock_keys();
    let limit = self.config.transaction_timeout;
    let deadline = Instant::now() + limit;

    let _guard = tokio::time::timeout(limit, self.locks.acquire(&keys))
      .await
      .map_err(|_| Error::Timeout(limit))?;

    let resolution = self
      .store
      .identify(observation, Some(deadline))
      .await
      .map_err(Into::<Error>::into)?;

    let primary = resolution.contact.primary_contact_id;
    match &resolution.outcome {
      Outcome::Created => tracing::info!(%primary, "created identity"),
      Outcome::Appended => tracing::debug!(%primary, "appended contact point"),
      Outcome::Merged { demoted, appended } => tracing::info!(
        %primary,
        ?demoted,
        appended,
        "merged identities"
      ),
      Outcome::Unchanged => tracing::debug!(%primary, "observation already known"),
    }

    Ok(resolution)
  }

  /// The consolidated view of the cluster containing `id`. Read-only, so it
  /// is simply abandoned on timeout.
  pub async fn consolidated(&self, id: ContactId) -> Result<Option<ConsolidatedContact>> {
    let limit = self.config.transaction_timeout;
    tokio::time::timeout(limit, self.store.consolidated(id))
      .await
      .map_err(|_| Error::Timeout(limit))?
      .map_err(Into::<Error>::into)
  }
}
