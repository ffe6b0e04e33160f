//! Query cache: fetched pages of ids per filter/sort signature.

use std::collections::{BTreeMap, HashMap};

use crate::listing::QuerySignature;

/// Pages fetched under one signature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheEntry {
  pages: BTreeMap<usize, Vec<String>>,
  /// Server-declared total for this signature
  pub total: usize,
  /// Every page up to `total` has been fetched
  pub complete: bool,
}

impl CacheEntry {
  pub fn page_count(&self) -> usize {
    self.pages.len()
  }

  /// Number of ids in the run of pages 0, 1, 2, ... with no gap.
  pub fn contiguous_loaded(&self) -> usize {
    self
      .pages
      .iter()
      .enumerate()
      .take_while(|(expected, (index, _))| *expected == **index)
      .map(|(_, (_, ids))| ids.len())
      .sum()
  }

  /// Ids of the contiguous pages, in page order.
  pub fn ids(&self) -> impl Iterator<Item = &String> {
    self
      .pages
      .iter()
      .enumerate()
      .take_while(|(expected, (index, _))| *expected == **index)
      .flat_map(|(_, (_, ids))| ids.iter())
  }

  fn recompute_complete(&mut self) {
    self.complete = self.contiguous_loaded() >= self.total;
  }
}

/// Cache of query results keyed by signature.
///
/// Entries never expire on their own. They are dropped only through
/// [`QueryCache::discard`] or [`QueryCache::clear`].
#[derive(Debug, Default)]
pub struct QueryCache {
  entries: HashMap<QuerySignature, CacheEntry>,
}

impl QueryCache {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, signature: &QuerySignature) -> Option<&CacheEntry> {
    self.entries.get(signature)
  }

  /// Store the ids of one page and refresh the entry's total/completeness.
  pub fn record_page(
    &mut self,
    signature: &QuerySignature,
    page_index: usize,
    ids: Vec<String>,
    declared_total: usize,
  ) -> &CacheEntry {
    let entry = self.entries.entry(signature.clone()).or_default();
    entry.pages.insert(page_index, ids);
    entry.total = declared_total;
    entry.recompute_complete();
    entry
  }

  /// Close an entry whose pages ran out before the declared total was met.
  pub fn mark_exhausted(&mut self, signature: &QuerySignature) {
    if let Some(entry) = self.entries.get_mut(signature) {
      entry.total = entry.contiguous_loaded();
      entry.complete = true;
    }
  }

  /// Drop the pages recorded for one signature ahead of a full reset.
  pub fn discard(&mut self, signature: &QuerySignature) {
    self.entries.remove(signature);
  }

  pub fn clear(&mut self) {
    self.entries.clear();
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }
}
