//! [`SqliteStore`] — the SQLite implementation of [`IdentityStore`].

use std::{
  path::Path,
  time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, TransactionBehavior};

use tether_core::{
  consolidate::{self, ConsolidatedContact},
  contact::{Contact, ContactId, NewContact},
  observation::Observation,
  resolver::{self, Resolution},
  store::{ContactTx, IdentityStore},
};

use crate::{
  encode::{CONTACT_COLUMNS, RawContact, encode_dt, encode_precedence},
  schema::SCHEMA,
  Error, Result,
};

// ─── Options ─────────────────────────────────────────────────────────────────

/// Connection-level settings applied at open.
#[derive(Debug, Clone)]
pub struct StoreOptions {
  /// How long a write waits on another process's lock before failing.
  pub busy_timeout: Duration,
}

impl Default for StoreOptions {
  fn default() -> Self { Self { busy_timeout: Duration::from_secs(2) } }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Tether contact store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. All clones
/// share one connection, so units of work run one at a time in arrival order.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with(path, StoreOptions::default()).await
  }

  pub async fn open_with(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init(options).await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init(StoreOptions::default()).await?;
    Ok(store)
  }

  async fn init(&self, options: StoreOptions) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.busy_timeout(options.busy_timeout)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// The schema revision recorded in the database file.
  pub async fn schema_version(&self) -> Result<i64> {
    let version = self
      .conn
      .call(|conn| Ok(conn.query_row("PRAGMA user_version", [], |r| r.get(0))?))
      .await?;
    Ok(version)
  }

  /// Run `work` inside one `BEGIN IMMEDIATE` transaction. It commits only if
  /// `work` returns `Ok`; otherwise every write it made is rolled back.
  pub async fn transaction<R, F>(&self, work: F) -> Result<R>
  where
    F: FnOnce(&mut SqliteTx<'_>) -> Result<R> + Send + 'static,
    R: Send + 'static,
  {
    self.transaction_until(None, work).await
  }

  /// Like [`SqliteStore::transaction`], but rolls back instead of committing
  /// once `deadline` has passed. Work still queued behind other units of
  /// work at the deadline is skipped entirely.
  pub async fn transaction_until<R, F>(
    &self,
    deadline: Option<Instant>,
    work: F,
  ) -> Result<R>
  where
    F: FnOnce(&mut SqliteTx<'_>) -> Result<R> + Send + 'static,
    R: Send + 'static,
  {
    let started = Instant::now();
    let expired = move || deadline.is_some_and(|d| Instant::now() >= d);
    self
      .conn
      .call(move |conn| {
        if expired() {
          return Ok(Err(Error::Core(tether_core::Error::Timeout(started.elapsed()))));
        }
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = work(&mut SqliteTx { conn: &tx });
        match out {
          Ok(_) if expired() => {
            tx.rollback()?;
            Ok(Err(Error::Core(tether_core::Error::Timeout(started.elapsed()))))
          }
          Ok(_) => {
            tx.commit()?;
            Ok(out)
          }
          Err(_) => Ok(out),
        }
      })
      .await?
  }

  /// Every live contact, in id order.
  pub async fn contacts(&self) -> Result<Vec<Contact>> {
    self
      .transaction(|tx| {
        tx.query_contacts(
          &format!(
            "SELECT {CONTACT_COLUMNS} FROM Contact
             WHERE deletedAt IS NULL
             ORDER BY id"
          ),
          [],
        )
      })
      .await
  }

  #[cfg(test)]
  pub(crate) async fn execute_raw(&self, sql: &'static str) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(sql)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── IdentityStore impl ──────────────────────────────────────────────────────

impl IdentityStore for SqliteStore {
  type Error = Error;

  async fn identify(
    &self,
    observation: Observation,
    deadline: Option<Instant>,
  ) -> Result<Resolution> {
    self
      .transaction_until(deadline, move |tx| {
        resolver::resolve(tx, &observation, Utc::now())
      })
      .await
  }

  async fn consolidated(&self, id: ContactId) -> Result<Option<ConsolidatedContact>> {
    self.transaction(move |tx| consolidate::view_of(tx, id)).await
  }

  async fn get_contact(&self, id: ContactId) -> Result<Option<Contact>> {
    self.transaction(move |tx| tx.get(id)).await
  }
}

// ─── Transaction ─────────────────────────────────────────────────────────────

/// [`ContactTx`] over an open SQLite transaction.
pub struct SqliteTx<'a> {
  conn: &'a rusqlite::Connection,
}

impl SqliteTx<'_> {
  fn query_contacts(
    &self,
    sql: &str,
    params: impl rusqlite::Params,
  ) -> Result<Vec<Contact>> {
    let mut stmt = self.conn.prepare_cached(sql)?;
    let raws = stmt
      .query_map(params, RawContact::from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    raws.into_iter().map(RawContact::into_contact).collect()
  }
}

impl ContactTx for SqliteTx<'_> {
  type Error = Error;

  fn find_matching(
    &mut self,
    email: Option<&str>,
    phone_number: Option<&str>,
  ) -> Result<Vec<Contact>> {
    // `= NULL` is never true, so an absent field matches nothing.
    self.query_contacts(
      &format!(
        "SELECT {CONTACT_COLUMNS} FROM Contact
         WHERE deletedAt IS NULL
           AND (email = ?1 OR phoneNumber = ?2)
         ORDER BY id"
      ),
      rusqlite::params![email, phone_number],
    )
  }

  fn get(&mut self, id: ContactId) -> Result<Option<Contact>> {
    let raw = self
      .conn
      .query_row(
        &format!(
          "SELECT {CONTACT_COLUMNS} FROM Contact
           WHERE id = ?1 AND deletedAt IS NULL"
        ),
        rusqlite::params![id.0],
        RawContact::from_row,
      )
      .optional()?;
    raw.map(RawContact::into_contact).transpose()
  }

  fn insert(&mut self, input: NewContact, now: DateTime<Utc>) -> Result<Contact> {
    let at_str = encode_dt(now);
    self.conn.execute(
      "INSERT INTO Contact (
         email, phoneNumber, linkedId, linkPrecedence, createdAt, updatedAt
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
      rusqlite::params![
        input.email,
        input.phone_number,
        input.linked_id.map(|id| id.0),
        encode_precedence(input.link_precedence),
        at_str,
      ],
    )?;

    Ok(Contact {
      id:              ContactId(self.conn.last_insert_rowid()),
      email:           input.email,
      phone_number:    input.phone_number,
      linked_id:       input.linked_id,
      link_precedence: input.link_precedence,
      created_at:      now,
      updated_at:      now,
      deleted_at:      None,
    })
  }

  fn demote(
    &mut self,
    id: ContactId,
    primary: ContactId,
    now: DateTime<Utc>,
  ) -> Result<()> {
    let changed = self.conn.execute(
      "UPDATE Contact
       SET linkPrecedence = 'secondary', linkedId = ?1, updatedAt = ?2
       WHERE id = ?3 AND deletedAt IS NULL",
      rusqlite::params![primary.0, encode_dt(now), id.0],
    )?;
    if changed == 0 {
      return Err(tether_core::Error::ContactNotFound(id).into());
    }
    Ok(())
  }

  fn relink(
    &mut self,
    from: ContactId,
    to: ContactId,
    now: DateTime<Utc>,
  ) -> Result<usize> {
    Ok(self.conn.execute(
      "UPDATE Contact
       SET linkedId = ?1, updatedAt = ?2
       WHERE linkedId = ?3 AND deletedAt IS NULL",
      rusqlite::params![to.0, encode_dt(now), from.0],
    )?)
  }

  fn cluster(&mut self, primary: ContactId) -> Result<Vec<Contact>> {
    self.query_contacts(
      &format!(
        "SELECT {CONTACT_COLUMNS} FROM Contact
         WHERE deletedAt IS NULL
           AND (id = ?1 OR linkedId = ?1)
         ORDER BY id"
      ),
      rusqlite::params![primary.0],
    )
  }
}
