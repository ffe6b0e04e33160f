//! Draft vs. applied filter state.

use crate::listing::{FilterPatch, FilterState, ValueRange};

/// Filters the user is editing (`draft`) and the ones in effect (`applied`).
///
/// Only [`FilterStaging::commit`] moves draft values into the applied set.
#[derive(Debug, Clone)]
pub struct FilterStaging {
  draft: FilterState,
  applied: FilterState,
}

impl FilterStaging {
  pub fn new(initial: FilterState) -> Self {
    Self {
      draft: initial.clone(),
      applied: initial,
    }
  }

  pub fn draft(&self) -> &FilterState {
    &self.draft
  }

  pub fn applied(&self) -> &FilterState {
    &self.applied
  }

  /// Merge a partial update into the draft.
  pub fn set_draft(&mut self, patch: FilterPatch) {
    if let Some(rooms) = patch.rooms {
      self.draft.rooms = rooms.into_iter().collect();
    }
    if let Some(price_range) = patch.price_range {
      self.draft.price_range = price_range;
    }
    if let Some(area_range) = patch.area_range {
      self.draft.area_range = area_range;
    }
  }

  /// Copy the draft into the applied set. Returns false, leaving everything
  /// as is, when the two are already equal.
  pub fn commit(&mut self) -> bool {
    let mut changed = false;

    if self.applied.rooms != self.draft.rooms {
      self.applied.rooms = self.draft.rooms.clone();
      changed = true;
    }
    if self.applied.price_range != self.draft.price_range {
      self.applied.price_range = self.draft.price_range;
      changed = true;
    }
    if self.applied.area_range != self.draft.area_range {
      self.applied.area_range = self.draft.area_range;
      changed = true;
    }

    changed
  }

  /// Point the draft at "no filter": no rooms and the full available ranges.
  pub fn clear_draft(&mut self, price_bounds: ValueRange, area_bounds: ValueRange) {
    self.draft = FilterState::new(price_bounds, area_bounds);
  }

  /// Replace both halves, e.g. with values restored from storage.
  pub fn restore(&mut self, filters: FilterState) {
    self.draft = filters.clone();
    self.applied = filters;
  }
}
