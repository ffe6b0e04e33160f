//! Offset/page bookkeeping for the active query.

/// Pagination state of the active query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
  pub current_page: usize,
  pub items_per_page: usize,
  pub total_items: usize,
  pub has_more: bool,
}

impl Pagination {
  pub fn new(items_per_page: usize) -> Self {
    Self {
      current_page: 0,
      items_per_page: items_per_page.max(1),
      total_items: 0,
      has_more: true,
    }
  }

  /// Back to page 0 ahead of a reset load.
  pub fn reset(&mut self) {
    self.current_page = 0;
    self.has_more = true;
  }

  pub fn offset(&self) -> usize {
    self.current_page * self.items_per_page
  }

  /// Record a completed page. `loaded` counts every item fetched so far
  /// under the active signature.
  pub fn advance(&mut self, loaded: usize, total: usize) {
    self.current_page += 1;
    self.total_items = total;
    self.has_more = loaded < total;
  }

  /// Jump to the end of a query that is already fully cached.
  pub fn finish(&mut self, pages: usize, total: usize) {
    self.current_page = pages;
    self.total_items = total;
    self.has_more = false;
  }
}
