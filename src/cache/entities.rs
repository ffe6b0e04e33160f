//! Id-keyed entity store with fingerprint-based change detection.

use std::collections::{HashMap, HashSet};

use super::traits::Cacheable;
use crate::listing::Fingerprint;

#[derive(Debug, Clone)]
struct StoredEntity<T> {
  fingerprint: Fingerprint,
  entity: T,
}

/// Every entity seen so far, keyed by id.
///
/// Entities keep the order in which their id was first seen. Re-upserting
/// a known id updates it in place and does not move it.
#[derive(Debug, Clone)]
pub struct EntityStore<T> {
  entries: HashMap<String, StoredEntity<T>>,
  order: Vec<String>,
}

impl<T> Default for EntityStore<T> {
  fn default() -> Self {
    Self {
      entries: HashMap::new(),
      order: Vec::new(),
    }
  }
}

impl<T: Cacheable> EntityStore<T> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Merge a batch into the store.
  ///
  /// Entities whose fingerprint matches the stored one are left untouched.
  /// With `purge_missing` and a non-empty batch, stored ids absent from the
  /// batch are removed. Returns whether anything changed.
  pub fn upsert(&mut self, batch: &[T], purge_missing: bool) -> bool {
    let mut changed = false;

    for entity in batch {
      let key = entity.cache_key();
      let fingerprint = entity.fingerprint();

      match self.entries.get_mut(key) {
        Some(stored) if stored.fingerprint == fingerprint => {}
        Some(stored) => {
          stored.fingerprint = fingerprint;
          stored.entity = entity.clone();
          changed = true;
        }
        None => {
          self.order.push(key.to_string());
          self.entries.insert(
            key.to_string(),
            StoredEntity {
              fingerprint,
              entity: entity.clone(),
            },
          );
          changed = true;
        }
      }
    }

    if purge_missing && !batch.is_empty() {
      let keep: HashSet<&str> = batch.iter().map(|e| e.cache_key()).collect();
      let before = self.order.len();
      self.entries.retain(|key, _| keep.contains(key.as_str()));
      self.order.retain(|key| keep.contains(key.as_str()));
      if self.order.len() != before {
        tracing::debug!(
          entity_type = T::entity_type(),
          removed = before - self.order.len(),
          "Purged entities missing from replacement batch"
        );
        changed = true;
      }
    }

    changed
  }

  pub fn get(&self, key: &str) -> Option<&T> {
    self.entries.get(key).map(|stored| &stored.entity)
  }

  #[cfg(test)]
  pub fn fingerprint(&self, key: &str) -> Option<Fingerprint> {
    self.entries.get(key).map(|stored| stored.fingerprint)
  }

  /// Entities in first-seen order.
  pub fn iter(&self) -> impl Iterator<Item = &T> {
    self
      .order
      .iter()
      .filter_map(|key| self.entries.get(key).map(|stored| &stored.entity))
  }

  pub fn len(&self) -> usize {
    self.order.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::listing::Apartment;

  fn apt(id: &str, price: u64) -> Apartment {
    Apartment {
      id: id.to_string(),
      name: format!("Квартира {}", id),
      area: 50.0,
      floor: 2,
      total_floors: 10,
      price,
      rooms: 2,
      plan_image: "/plans/plan-1.png".to_string(),
    }
  }

  fn keys(store: &EntityStore<Apartment>) -> Vec<String> {
    store.iter().map(|a| a.id.clone()).collect()
  }

  #[test]
  fn test_upsert_same_batch_twice_is_idempotent() {
    let mut store = EntityStore::new();
    let batch = vec![apt("1", 100), apt("2", 200)];

    assert!(store.upsert(&batch, false));
    let snapshot: Vec<(Apartment, Fingerprint)> = store
      .iter()
      .map(|a| (a.clone(), store.fingerprint(&a.id).unwrap()))
      .collect();

    assert!(!store.upsert(&batch, false));
    let again: Vec<(Apartment, Fingerprint)> = store
      .iter()
      .map(|a| (a.clone(), store.fingerprint(&a.id).unwrap()))
      .collect();
    assert_eq!(snapshot, again);
  }

  #[test]
  fn test_changed_price_is_reported() {
    let mut store = EntityStore::new();
    store.upsert(&[apt("1", 100)], false);

    assert!(store.upsert(&[apt("1", 150)], false));
    assert_eq!(store.get("1").unwrap().price, 150);
    assert_eq!(store.len(), 1);
  }

  #[test]
  fn test_plan_image_only_change_is_ignored() {
    let mut store = EntityStore::new();
    store.upsert(&[apt("1", 100)], false);

    let mut moved = apt("1", 100);
    moved.plan_image = "/plans/plan-2.png".to_string();
    assert!(!store.upsert(&[moved], false));
    assert_eq!(store.get("1").unwrap().plan_image, "/plans/plan-1.png");
  }

  #[test]
  fn test_first_seen_order_is_stable() {
    let mut store = EntityStore::new();
    store.upsert(&[apt("b", 1), apt("a", 1)], false);
    store.upsert(&[apt("c", 1), apt("b", 2)], false);
    assert_eq!(keys(&store), vec!["b", "a", "c"]);
  }

  #[test]
  fn test_append_keeps_entities_from_other_batches() {
    let mut store = EntityStore::new();
    store.upsert(&[apt("1", 1), apt("2", 1)], false);
    store.upsert(&[apt("3", 1)], false);
    assert_eq!(store.len(), 3);
  }

  #[test]
  fn test_purge_removes_missing() {
    let mut store = EntityStore::new();
    store.upsert(&[apt("1", 1), apt("2", 1), apt("3", 1)], false);

    assert!(store.upsert(&[apt("2", 1)], true));
    assert_eq!(keys(&store), vec!["2"]);
    assert!(store.get("1").is_none());
  }

  #[test]
  fn test_purge_with_empty_batch_is_noop() {
    let mut store = EntityStore::new();
    store.upsert(&[apt("1", 1)], false);

    assert!(!store.upsert(&[], true));
    assert_eq!(store.len(), 1);
  }
}
