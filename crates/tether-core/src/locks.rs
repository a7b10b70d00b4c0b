//! Per-key serialization of resolutions.
//!
//! Two resolutions that share an email or phone key run one after the other;
//! resolutions over disjoint keys never wait on each other.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slot = Arc<AsyncMutex<()>>;

/// A table of async locks, one per observation key, created on demand.
#[derive(Debug, Default)]
pub struct KeyedLocks {
  slots: Mutex<HashMap<String, Slot>>,
}

/// Holds every key of one observation until dropped.
#[derive(Debug)]
pub struct KeyGuard {
  _held: Vec<OwnedMutexGuard<()>>,
}

impl KeyedLocks {
  pub fn new() -> Self { Self::default() }

  /// Wait until every key in `keys` is free, then hold all of them.
  ///
  /// Keys are taken in sorted order, so two callers with overlapping key sets
  /// cannot deadlock.
  pub async fn acquire(&self, keys: &[String]) -> KeyGuard {
    let mut keys = keys.to_vec();
    keys.sort();
    keys.dedup();

    let slots: Vec<Slot> = {
      // The map is only ever left in a consistent state, so a poisoned lock
      // is safe to reuse.
      let mut map = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
      map.retain(|_, slot| Arc::strong_count(slot) > 1);
      keys
        .iter()
        .map(|key| Arc::clone(map.entry(key.clone()).or_default()))
        .collect()
    };

    let mut held = Vec::with_capacity(slots.len());
    for slot in slots {
      held.push(slot.lock_owned().await);
    }
    KeyGuard { _held: held }
  }

  /// Number of keys currently tracked, held or not yet pruned.
  pub fn tracked(&self) -> usize {
    self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use super::*;

  fn keys(list: &[&str]) -> Vec<String> {
    list.iter().map(|k| k.to_string()).collect()
  }

  #[tokio::test]
  async fn shared_key_is_exclusive() {
    let locks = Arc::new(KeyedLocks::new());
    let first = locks.acquire(&keys(&["email:a@x.com"])).await;

    let contender = {
      let locks = Arc::clone(&locks);
      tokio::spawn(async move {
        locks.acquire(&keys(&["email:a@x.com", "phone:123"])).await;
      })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!contender.is_finished());

    drop(first);
    tokio::time::timeout(Duration::from_secs(1), contender)
      .await
      .expect("contender acquires after release")
      .unwrap();
  }

  #[tokio::test]
  async fn disjoint_keys_do_not_wait() {
    let locks = KeyedLocks::new();
    let _a = locks.acquire(&keys(&["email:a@x.com"])).await;
    let b = tokio::time::timeout(
      Duration::from_millis(200),
      locks.acquire(&keys(&["email:b@x.com", "phone:456"])),
    )
    .await;
    assert!(b.is_ok());
  }

  #[tokio::test]
  async fn idle_slots_are_pruned() {
    let locks = KeyedLocks::new();
    drop(locks.acquire(&keys(&["email:a@x.com", "phone:1"])).await);
    assert_eq!(locks.tracked(), 2);

    let _held = locks.acquire(&keys(&["phone:2"])).await;
    assert_eq!(locks.tracked(), 1);
  }
}
