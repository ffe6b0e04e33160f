//! Visible-list derivation over the entity store.

use super::entities::EntityStore;
use crate::listing::sort::sort_listings;
use crate::listing::{Apartment, FilterState, QuerySignature, SortState};

/// Memoized ids of the stored listings that pass the applied filters, in
/// display order.
///
/// The memo is keyed by the query signature and must be invalidated when
/// the store reports a change.
#[derive(Debug, Default)]
pub struct VisibleList {
  memo: Option<(QuerySignature, Vec<String>)>,
}

impl VisibleList {
  pub fn invalidate(&mut self) {
    self.memo = None;
  }

  pub fn is_cached(&self, signature: &QuerySignature) -> bool {
    matches!(&self.memo, Some((memo_sig, _)) if memo_sig == signature)
  }

  /// Ids to show for `filters` + `sort`, recomputed only on a memo miss.
  pub fn ids(
    &mut self,
    store: &EntityStore<Apartment>,
    filters: &FilterState,
    sort: &SortState,
  ) -> &[String] {
    let signature = QuerySignature::new(filters, sort);
    if !self.is_cached(&signature) {
      self.memo = Some((signature, derive(store, filters, sort)));
    }
    match &self.memo {
      Some((_, ids)) => ids,
      None => &[],
    }
  }

  /// Resolved listings in display order.
  pub fn listings(
    &mut self,
    store: &EntityStore<Apartment>,
    filters: &FilterState,
    sort: &SortState,
  ) -> Vec<Apartment> {
    self
      .ids(store, filters, sort)
      .iter()
      .filter_map(|id| store.get(id).cloned())
      .collect()
  }
}

fn derive(store: &EntityStore<Apartment>, filters: &FilterState, sort: &SortState) -> Vec<String> {
  let mut matching: Vec<&Apartment> = store.iter().filter(|a| filters.matches(a)).collect();
  sort_listings(&mut matching, sort, |a| *a);
  matching.into_iter().map(|a| a.id.clone()).collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::listing::{SortDirection, ValueRange};

  fn apt(id: &str, rooms: u32, price: u64, area: f64) -> Apartment {
    Apartment {
      id: id.to_string(),
      name: format!("Квартира {}", id),
      area,
      floor: 1,
      total_floors: 5,
      price,
      rooms,
      plan_image: String::new(),
    }
  }

  fn store() -> EntityStore<Apartment> {
    let mut store = EntityStore::new();
    store.upsert(
      &[
        apt("1", 1, 5_000_000, 33.0),
        apt("2", 2, 9_000_000, 55.0),
        apt("3", 3, 14_000_000, 90.0),
        apt("4", 2, 9_000_000, 60.0),
        apt("5", 1, 19_000_000, 40.0),
      ],
      false,
    );
    store
  }

  fn open_filters() -> FilterState {
    FilterState::new(ValueRange(0, 0), ValueRange(0, 0))
  }

  #[test]
  fn test_filter_matches_exactly_the_predicate() {
    let store = store();
    let mut filters = FilterState::new(ValueRange(6_000_000, 15_000_000), ValueRange(50, 95));
    filters.rooms.extend([2, 3]);

    let mut visible = VisibleList::default();
    let ids = visible.ids(&store, &filters, &SortState::default()).to_vec();

    for apartment in store.iter() {
      let expected = (filters.rooms.is_empty() || filters.rooms.contains(&apartment.rooms))
        && (6_000_000..=15_000_000).contains(&apartment.price)
        && apartment.area >= 50.0
        && apartment.area <= 95.0;
      assert_eq!(ids.contains(&apartment.id), expected, "listing {}", apartment.id);
    }
  }

  #[test]
  fn test_natural_order_is_first_seen() {
    let store = store();
    let mut visible = VisibleList::default();
    let ids = visible.ids(&store, &open_filters(), &SortState::default());
    assert_eq!(ids, ["1", "2", "3", "4", "5"]);
  }

  #[test]
  fn test_sort_desc_is_reverse_of_asc_except_ties() {
    let store = store();
    let mut visible = VisibleList::default();

    let asc = visible
      .ids(&store, &open_filters(), &SortState::new("price", SortDirection::Asc))
      .to_vec();
    let desc = visible
      .ids(&store, &open_filters(), &SortState::new("price", SortDirection::Desc))
      .to_vec();

    assert_eq!(asc, ["1", "2", "4", "3", "5"]);
    assert_eq!(desc, ["5", "3", "2", "4", "1"]);
  }

  #[test]
  fn test_memo_serves_until_invalidated() {
    let mut store = store();
    let mut visible = VisibleList::default();
    let filters = open_filters();
    let sort = SortState::default();

    assert_eq!(visible.ids(&store, &filters, &sort).len(), 5);
    assert!(visible.is_cached(&QuerySignature::new(&filters, &sort)));

    store.upsert(&[apt("6", 1, 1, 1.0)], false);
    // Stale until told otherwise
    assert_eq!(visible.ids(&store, &filters, &sort).len(), 5);

    visible.invalidate();
    assert_eq!(visible.ids(&store, &filters, &sort).len(), 6);
  }

  #[test]
  fn test_listings_resolves_entities() {
    let store = store();
    let mut visible = VisibleList::default();
    let mut filters = open_filters();
    filters.rooms.insert(3);

    let listings = visible.listings(&store, &filters, &SortState::default());
    assert_eq!(listings.len(), 1);
    assert_eq!(listings[0].id, "3");
  }
}
