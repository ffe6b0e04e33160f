//! Content fingerprints and query signatures for listing data.

use sha2::{Digest, Sha256};
use std::fmt;

use crate::cache::Cacheable;

use super::types::{Apartment, FilterState, SortState};

// ============================================================================
// Cacheable implementation
// ============================================================================

impl Cacheable for Apartment {
  fn cache_key(&self) -> &str {
    &self.id
  }

  fn fingerprint(&self) -> Fingerprint {
    // planImage and totalFloors are display-only and don't count as changes
    Fingerprint::of(&format!(
      "{}|{}|{}|{}|{}|{}",
      self.id, self.name, self.area, self.floor, self.price, self.rooms
    ))
  }

  fn entity_type() -> &'static str {
    "apartment"
  }
}

// ============================================================================
// Fingerprint
// ============================================================================

/// Deterministic digest over an entity's significant fields.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
  pub fn of(input: &str) -> Self {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    Self(hasher.finalize().into())
  }
}

impl fmt::Display for Fingerprint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&hex::encode(self.0))
  }
}

impl fmt::Debug for Fingerprint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Fingerprint({})", &hex::encode(self.0)[..12])
  }
}

// ============================================================================
// Query signature
// ============================================================================

/// Canonical cache key for an applied filter + sort combination.
///
/// Rooms are kept in a sorted set, so two states that differ only in the
/// order rooms were picked produce the same signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QuerySignature(String);

impl QuerySignature {
  pub fn new(filters: &FilterState, sort: &SortState) -> Self {
    let rooms = filters
      .rooms
      .iter()
      .map(|r| r.to_string())
      .collect::<Vec<_>>()
      .join(",");

    Self(format!(
      "r:{}|p:{}|a:{}|s:{}:{}",
      rooms,
      filters.price_range,
      filters.area_range,
      sort.field,
      sort.direction.as_str()
    ))
  }

  /// Short stable hash, handy for log lines.
  pub fn short_hash(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.0.as_bytes());
    hex::encode(&hasher.finalize()[..6])
  }
}

impl fmt::Display for QuerySignature {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::listing::types::{SortDirection, ValueRange};

  fn apartment() -> Apartment {
    Apartment {
      id: "a1".to_string(),
      name: "Квартира 1".to_string(),
      area: 45.5,
      floor: 3,
      total_floors: 9,
      price: 7_000_000,
      rooms: 2,
      plan_image: "/plans/plan-1.png".to_string(),
    }
  }

  fn filters_with_rooms(rooms: &[u32]) -> FilterState {
    let mut filters = FilterState::new(ValueRange(100, 200), ValueRange(30, 90));
    filters.rooms.extend(rooms.iter().copied());
    filters
  }

  #[test]
  fn test_fingerprint_is_deterministic() {
    assert_eq!(apartment().fingerprint(), apartment().fingerprint());
  }

  #[test]
  fn test_fingerprint_tracks_significant_fields() {
    let base = apartment().fingerprint();

    let mutations: Vec<fn(&mut Apartment)> = vec![
      |a| a.price += 1,
      |a| a.area += 0.5,
      |a| a.rooms += 1,
      |a| a.floor += 1,
      |a| a.name.push('!'),
    ];
    for mutate in mutations {
      let mut changed = apartment();
      mutate(&mut changed);
      assert_ne!(changed.fingerprint(), base);
    }
  }

  #[test]
  fn test_fingerprint_ignores_plan_image() {
    let mut changed = apartment();
    changed.plan_image = "/plans/plan-99.png".to_string();
    assert_eq!(changed.fingerprint(), apartment().fingerprint());
  }

  #[test]
  fn test_signature_ignores_room_order() {
    let sort = SortState::new("price", SortDirection::Desc);
    let a = QuerySignature::new(&filters_with_rooms(&[2, 1]), &sort);
    let b = QuerySignature::new(&filters_with_rooms(&[1, 2]), &sort);
    assert_eq!(a, b);
    assert_eq!(a.to_string(), "r:1,2|p:100-200|a:30-90|s:price:desc");
  }

  #[test]
  fn test_signature_distinguishes_sort() {
    let filters = filters_with_rooms(&[1]);
    let asc = QuerySignature::new(&filters, &SortState::new("price", SortDirection::Asc));
    let desc = QuerySignature::new(&filters, &SortState::new("price", SortDirection::Desc));
    assert_ne!(asc, desc);
    assert_ne!(asc.short_hash(), desc.short_hash());
  }
}
