//! Sort keys for listings.
//!
//! Names and plan images carry an embedded number ("Квартира 12",
//! "/plans/plan-7.png"), and ordering by those fields means ordering by that
//! number rather than by the raw text.

use super::types::{Apartment, SortDirection, SortState};

/// Field a listing collection can be ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
  Name,
  Plan,
  Area,
  Floor,
  TotalFloors,
  Price,
  Rooms,
}

impl SortField {
  pub fn parse(field: &str) -> Option<Self> {
    match field {
      "name" => Some(SortField::Name),
      "plan" | "planImage" => Some(SortField::Plan),
      "area" => Some(SortField::Area),
      "floor" => Some(SortField::Floor),
      "totalFloors" => Some(SortField::TotalFloors),
      "price" => Some(SortField::Price),
      "rooms" => Some(SortField::Rooms),
      _ => None,
    }
  }

  /// Numeric key for this field.
  pub fn key(&self, apartment: &Apartment) -> f64 {
    match self {
      SortField::Name => first_number(&apartment.name).unwrap_or(0) as f64,
      SortField::Plan => plan_number(&apartment.plan_image).unwrap_or(0) as f64,
      SortField::Area => apartment.area,
      SortField::Floor => apartment.floor as f64,
      SortField::TotalFloors => apartment.total_floors as f64,
      SortField::Price => apartment.price as f64,
      SortField::Rooms => apartment.rooms as f64,
    }
  }
}

/// Stable in-place sort. Ties keep their relative input order in both
/// directions; unknown fields leave the order untouched.
pub fn sort_listings<T, F>(items: &mut [T], sort: &SortState, project: F)
where
  F: Fn(&T) -> &Apartment,
{
  if sort.is_natural() {
    return;
  }
  let Some(field) = SortField::parse(&sort.field) else {
    tracing::warn!(field = %sort.field, "Unknown sort field, keeping natural order");
    return;
  };

  items.sort_by(|a, b| {
    let ordering = field.key(project(a)).total_cmp(&field.key(project(b)));
    match sort.direction {
      SortDirection::Asc => ordering,
      SortDirection::Desc => ordering.reverse(),
    }
  });
}

/// First run of ASCII digits in `s`.
pub fn first_number(s: &str) -> Option<u64> {
  let start = s.find(|c: char| c.is_ascii_digit())?;
  leading_number(&s[start..])
}

/// Number following the first `plan-` marker in `s`.
pub fn plan_number(s: &str) -> Option<u64> {
  let start = s.find("plan-")? + "plan-".len();
  leading_number(&s[start..])
}

fn leading_number(s: &str) -> Option<u64> {
  let end = s
    .find(|c: char| !c.is_ascii_digit())
    .unwrap_or(s.len());
  s[..end].parse().ok()
}
