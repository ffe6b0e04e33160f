//! In-process listing source answering the endpoint contract from a
//! dataset held in memory.
//!
//! Filtering treats zero bounds as unset, sorting extracts the embedded
//! number for `name` and `plan`, `limit` is capped at 100, and the declared
//! ranges always describe the whole dataset rather than the filtered slice.

use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::client::{ListingSource, ListingsPage, PageRequest};
use crate::error::SyncError;
use crate::listing::sort::sort_listings;
use crate::listing::{Apartment, ValueRange};

const MAX_LIMIT: usize = 100;

/// Dataset file layout: an object holding the listings, or a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum DatasetFile {
  Wrapped {
    #[serde(alias = "apartments")]
    listings: Vec<Apartment>,
  },
  Bare(Vec<Apartment>),
}

pub struct LocalSource {
  listings: Vec<Apartment>,
  calls: AtomicUsize,
}

impl LocalSource {
  pub fn new(listings: Vec<Apartment>) -> Self {
    Self {
      listings,
      calls: AtomicUsize::new(0),
    }
  }

  /// Load a dataset from a JSON file.
  pub fn from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read dataset {}: {}", path.display(), e))?;

    let dataset: DatasetFile = serde_json::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse dataset {}: {}", path.display(), e))?;

    let listings = match dataset {
      DatasetFile::Wrapped { listings } | DatasetFile::Bare(listings) => listings,
    };
    tracing::info!(count = listings.len(), path = %path.display(), "Loaded local dataset");

    Ok(Self::new(listings))
  }

  /// Number of page requests answered so far.
  #[cfg(test)]
  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  /// Answer a request the way the HTTP endpoint does.
  pub fn query(&self, request: &PageRequest) -> ListingsPage {
    let mut matching: Vec<&Apartment> = self
      .listings
      .iter()
      .filter(|a| request.filters.matches(a))
      .collect();
    sort_listings(&mut matching, &request.sort, |a| *a);

    let total = matching.len();
    let limit = request.limit.min(MAX_LIMIT);
    let listings = matching
      .into_iter()
      .skip(request.offset)
      .take(limit)
      .cloned()
      .collect();

    ListingsPage {
      listings,
      total: Some(total),
      price_range: self.global_range(|a| a.price as f64),
      area_range: self.global_range(|a| a.area),
    }
  }

  fn global_range(&self, value: impl Fn(&Apartment) -> f64) -> Option<ValueRange> {
    let (min, max) = self
      .listings
      .iter()
      .map(value)
      .fold(None, |acc: Option<(f64, f64)>, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
      })?;
    ValueRange::checked(min.floor() as u64, max.ceil() as u64)
  }
}

impl ListingSource for LocalSource {
  async fn fetch_page(&self, request: &PageRequest) -> Result<ListingsPage, SyncError> {
    let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
    tracing::debug!(call, offset = request.offset, limit = request.limit, "Local page request");
    // Let other work on the task run, as a real request would
    tokio::task::yield_now().await;
    Ok(self.query(request))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::listing::{FilterState, SortDirection, SortState};

  fn dataset() -> Vec<Apartment> {
    (1..=12)
      .map(|i| Apartment {
        id: i.to_string(),
        name: format!("Квартира {}", i),
        area: 30.0 + i as f64 * 5.5,
        floor: i as i32,
        total_floors: 17,
        price: 5_000_000 + (i % 4) * 1_000_000,
        rooms: (i % 3 + 1) as u32,
        plan_image: format!("/plans/plan-{}.png", 13 - i),
      })
      .collect()
  }

  fn request(offset: usize, limit: usize) -> PageRequest {
    PageRequest {
      offset,
      limit,
      sort: SortState::default(),
      filters: FilterState::new(ValueRange(0, 0), ValueRange(0, 0)),
    }
  }

  #[test]
  fn test_slices_with_total() {
    let source = LocalSource::new(dataset());
    let page = source.query(&request(10, 5));
    assert_eq!(page.listings.len(), 2);
    assert_eq!(page.total, Some(12));
  }

  #[test]
  fn test_declared_ranges_cover_dataset() {
    let source = LocalSource::new(dataset());
    let mut req = request(0, 5);
    req.filters.rooms.insert(1);
    let page = source.query(&req);

    assert_eq!(page.price_range, Some(ValueRange(5_000_000, 8_000_000)));
    assert_eq!(page.area_range, Some(ValueRange(35, 96)));
  }

  #[test]
  fn test_filters_and_sorts() {
    let source = LocalSource::new(dataset());
    let mut req = request(0, 100);
    req.filters.rooms.insert(2);
    req.sort = SortState::new("plan", SortDirection::Asc);

    let page = source.query(&req);
    let ids: Vec<&str> = page.listings.iter().map(|a| a.id.as_str()).collect();
    // rooms == 2 for i % 3 == 1; plan number runs opposite to id
    assert_eq!(ids, vec!["10", "7", "4", "1"]);
    assert_eq!(page.total, Some(4));
  }

  #[test]
  fn test_limit_is_capped() {
    let many: Vec<Apartment> = (0..150)
      .map(|i| Apartment {
        id: i.to_string(),
        name: String::new(),
        area: 40.0,
        floor: 1,
        total_floors: 1,
        price: 1,
        rooms: 1,
        plan_image: String::new(),
      })
      .collect();
    let source = LocalSource::new(many);
    assert_eq!(source.query(&request(0, 500)).listings.len(), MAX_LIMIT);
  }

  #[test]
  fn test_empty_dataset_has_no_ranges() {
    let source = LocalSource::new(Vec::new());
    let page = source.query(&request(0, 5));
    assert_eq!(page.total, Some(0));
    assert_eq!(page.price_range, None);
  }

  #[tokio::test]
  async fn test_fetch_counts_calls() {
    let source = LocalSource::new(dataset());
    source.fetch_page(&request(0, 5)).await.unwrap();
    source.fetch_page(&request(5, 5)).await.unwrap();
    assert_eq!(source.calls(), 2);
  }
}
