//! Integration tests for `SqliteStore` against an in-memory database.

use std::{
  sync::Arc,
  time::{Duration, Instant},
};

use tether_core::{
  contact::{ContactId, LinkPrecedence, NewContact},
  observation::Observation,
  resolver::Outcome,
  service::{IdentityService, ServiceConfig},
  store::{ContactTx, IdentityStore},
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn obs(email: Option<&str>, phone: Option<&str>) -> Observation {
  Observation::new(email.map(Into::into), phone.map(Into::into)).unwrap()
}

// ─── Schema ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn schema_is_versioned() {
  let s = store().await;
  assert_eq!(s.schema_version().await.unwrap(), 1);
}

#[tokio::test]
async fn rows_use_the_contact_relation_layout() {
  let s = store().await;
  s.execute_raw(
    "INSERT INTO Contact (
       phoneNumber, email, linkedId, linkPrecedence, createdAt, updatedAt, deletedAt
     ) VALUES ('123', 'a@x.com', NULL, 'primary',
               '2024-01-01T00:00:00+00:00', '2024-01-01T00:00:00+00:00', NULL)",
  )
  .await
  .unwrap();

  let stored = s.get_contact(ContactId(1)).await.unwrap().unwrap();
  assert_eq!(stored.email.as_deref(), Some("a@x.com"));
  assert_eq!(stored.phone_number.as_deref(), Some("123"));
  assert!(stored.is_primary());
}

#[tokio::test]
async fn precedence_and_link_must_agree() {
  let s = store().await;
  let err = s
    .execute_raw(
      "INSERT INTO Contact (email, linkPrecedence, createdAt, updatedAt)
       VALUES ('x@y.z', 'secondary', '2024-01-01T00:00:00+00:00', '2024-01-01T00:00:00+00:00')",
    )
    .await;
  assert!(err.is_err());
}

// ─── Resolution ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn new_identity_creates_single_primary() {
  let s = store().await;

  let r = s.identify(obs(Some("a@x.com"), Some("123")), None).await.unwrap();
  assert_eq!(r.outcome, Outcome::Created);
  assert_eq!(r.contact.emails, vec!["a@x.com".to_string()]);
  assert_eq!(r.contact.phone_numbers, vec!["123".to_string()]);
  assert!(r.contact.secondary_contact_ids.is_empty());

  let stored = s.get_contact(r.contact.primary_contact_id).await.unwrap().unwrap();
  assert_eq!(stored.link_precedence, LinkPrecedence::Primary);
  assert_eq!(stored.linked_id, None);
  assert_eq!(stored.created_at, stored.updated_at);
}

#[tokio::test]
async fn append_links_secondary_to_primary() {
  let s = store().await;
  let first = s.identify(obs(Some("a@x.com"), Some("123")), None).await.unwrap();
  let primary = first.contact.primary_contact_id;

  let r = s.identify(obs(Some("a@x.com"), Some("456")), None).await.unwrap();
  assert_eq!(r.outcome, Outcome::Appended);
  assert_eq!(r.contact.primary_contact_id, primary);
  assert_eq!(r.contact.phone_numbers, vec!["123".to_string(), "456".to_string()]);
  assert_eq!(r.contact.secondary_contact_ids.len(), 1);

  let secondary = s
    .get_contact(r.contact.secondary_contact_ids[0])
    .await
    .unwrap()
    .unwrap();
  assert_eq!(secondary.linked_id, Some(primary));
}

#[tokio::test]
async fn merge_demotes_later_primary_and_repoints_its_secondaries() {
  let s = store().await;
  s.identify(obs(Some("a@x.com"), Some("1")), None).await.unwrap();
  s.identify(obs(Some("b@x.com"), Some("2")), None).await.unwrap();
  s.identify(obs(Some("c@x.com"), Some("2")), None).await.unwrap();

  let r = s.identify(obs(Some("a@x.com"), Some("2")), None).await.unwrap();
  assert_eq!(r.outcome, Outcome::Merged {
    demoted:  vec![ContactId(2)],
    appended: true,
  });
  assert_eq!(r.contact.primary_contact_id, ContactId(1));
  assert_eq!(r.contact.secondary_contact_ids, vec![
    ContactId(2),
    ContactId(3),
    ContactId(4),
  ]);

  let all = s.contacts().await.unwrap();
  assert_eq!(all.iter().filter(|c| c.is_primary()).count(), 1);
  assert!(
    all
      .iter()
      .filter(|c| !c.is_primary())
      .all(|c| c.linked_id == Some(ContactId(1)))
  );

  let demoted = all.iter().find(|c| c.id == ContactId(2)).unwrap();
  assert!(demoted.updated_at >= demoted.created_at);
}

#[tokio::test]
async fn repeating_exact_pair_adds_nothing() {
  let s = store().await;
  s.identify(obs(Some("a@x.com"), Some("123")), None).await.unwrap();
  s.identify(obs(Some("a@x.com"), Some("456")), None).await.unwrap();

  let r = s.identify(obs(Some("a@x.com"), Some("456")), None).await.unwrap();
  assert_eq!(r.outcome, Outcome::Unchanged);
  assert_eq!(s.contacts().await.unwrap().len(), 2);
}

#[tokio::test]
async fn null_fields_never_match_each_other() {
  let s = store().await;
  s.identify(obs(Some("a@x.com"), None), None).await.unwrap();

  let r = s.identify(obs(None, Some("999")), None).await.unwrap();
  assert_eq!(r.outcome, Outcome::Created);
  assert_eq!(s.contacts().await.unwrap().len(), 2);
}

#[tokio::test]
async fn consolidated_view_from_secondary_id() {
  let s = store().await;
  s.identify(obs(Some("a@x.com"), Some("1")), None).await.unwrap();
  let r = s.identify(obs(Some("b@x.com"), Some("1")), None).await.unwrap();

  let view = s.consolidated(ContactId(2)).await.unwrap().unwrap();
  assert_eq!(view, r.contact);
  assert!(s.consolidated(ContactId(100)).await.unwrap().is_none());
}

// ─── Soft deletion ───────────────────────────────────────────────────────────

#[tokio::test]
async fn soft_deleted_rows_are_invisible() {
  let s = store().await;
  s.identify(obs(Some("gone@x.com"), Some("1")), None).await.unwrap();
  s.execute_raw("UPDATE Contact SET deletedAt = '2024-01-01T00:00:00+00:00' WHERE id = 1")
    .await
    .unwrap();

  assert!(s.get_contact(ContactId(1)).await.unwrap().is_none());
  let r = s.identify(obs(Some("gone@x.com"), Some("1")), None).await.unwrap();
  assert_eq!(r.outcome, Outcome::Created);
  assert_eq!(r.contact.primary_contact_id, ContactId(2));
}

// ─── Atomicity ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_transaction_rolls_back() {
  let s = store().await;
  s.identify(obs(Some("a@x.com"), Some("1")), None).await.unwrap();

  let result: crate::Result<()> = s
    .transaction(|tx| {
      tx.insert(
        NewContact::primary(&obs(Some("b@x.com"), None)),
        chrono::Utc::now(),
      )?;
      tx.demote(ContactId(1), ContactId(2), chrono::Utc::now())?;
      tx.demote(ContactId(404), ContactId(2), chrono::Utc::now())?;
      Ok(())
    })
    .await;

  assert!(matches!(
    result,
    Err(crate::Error::Core(tether_core::Error::ContactNotFound(ContactId(404))))
  ));
  let all = s.contacts().await.unwrap();
  assert_eq!(all.len(), 1);
  assert!(all[0].is_primary());
}

#[tokio::test]
async fn transaction_past_deadline_rolls_back() {
  let s = store().await;
  let deadline = Instant::now() + Duration::from_millis(20);

  let result = s
    .transaction_until(Some(deadline), |tx| {
      tx.insert(NewContact::primary(&obs(Some("late@x.com"), None)), chrono::Utc::now())?;
      std::thread::sleep(Duration::from_millis(60));
      Ok(())
    })
    .await;

  assert!(matches!(
    result,
    Err(crate::Error::Core(tether_core::Error::Timeout(_)))
  ));
  assert!(s.contacts().await.unwrap().is_empty());
}

#[tokio::test]
async fn timed_out_identify_commits_nothing() {
  let s = store().await;

  // Occupy the connection past the service deadline.
  let blocker = {
    let s = s.clone();
    tokio::spawn(async move {
      s.transaction(|_| {
        std::thread::sleep(Duration::from_millis(300));
        Ok(())
      })
      .await
    })
  };
  tokio::time::sleep(Duration::from_millis(20)).await;

  let service = IdentityService::new(Arc::new(s.clone()), ServiceConfig {
    transaction_timeout: Duration::from_millis(50),
  });
  let err = service.identify(obs(Some("a@x.com"), Some("1"))).await.unwrap_err();
  assert!(err.is_retryable(), "{err}");

  blocker.await.unwrap().unwrap();
  assert!(s.contacts().await.unwrap().is_empty());
}

#[test]
fn store_errors_convert_into_core_errors() {
  let timeout = tether_core::Error::from(crate::Error::Core(tether_core::Error::Timeout(
    Duration::from_millis(5),
  )));
  assert!(timeout.is_retryable());

  let other = tether_core::Error::from(crate::Error::UnknownPrecedence("tertiary".into()));
  assert!(matches!(other, tether_core::Error::Store(_)));
}

// ─── Concurrency ─────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_identical_observations_create_one_primary() {
  let service = Arc::new(IdentityService::new(
    Arc::new(store().await),
    ServiceConfig::default(),
  ));

  let handles: Vec<_> = (0..16)
    .map(|_| {
      let service = Arc::clone(&service);
      tokio::spawn(async move {
        service.identify(obs(Some("new@x.com"), Some("555"))).await
      })
    })
    .collect();

  for handle in handles {
    handle.await.unwrap().unwrap();
  }

  let all = service.store().contacts().await.unwrap();
  assert_eq!(all.len(), 1);
  assert!(all[0].is_primary());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_disjoint_observations_each_create_a_primary() {
  let service = Arc::new(IdentityService::new(
    Arc::new(store().await),
    ServiceConfig::default(),
  ));

  let handles: Vec<_> = (0..8)
    .map(|i| {
      let service = Arc::clone(&service);
      tokio::spawn(async move {
        let email = format!("user{i}@x.com");
        service.identify(obs(Some(&email), None)).await
      })
    })
    .collect();

  for handle in handles {
    assert_eq!(handle.await.unwrap().unwrap().outcome, Outcome::Created);
  }
  assert_eq!(service.store().contacts().await.unwrap().len(), 8);
}
