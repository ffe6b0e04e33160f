use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A single apartment listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Apartment {
  #[serde(deserialize_with = "deserialize_id")]
  pub id: String,
  #[serde(default)]
  pub name: String,
  pub area: f64,
  #[serde(default)]
  pub floor: i32,
  #[serde(default)]
  pub total_floors: i32,
  pub price: u64,
  pub rooms: u32,
  #[serde(default)]
  pub plan_image: String,
}

/// Ids arrive either as strings or as bare numbers
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum RawId {
    Text(String),
    Int(i64),
    Float(f64),
  }

  Ok(match RawId::deserialize(deserializer)? {
    RawId::Text(s) => s,
    RawId::Int(n) => n.to_string(),
    RawId::Float(f) => f.to_string(),
  })
}

/// Inclusive `[min, max]` range. Serialized as a two-element array.
///
/// A bound of 0 means "unset": the lower side falls back to no bound and
/// the upper side to unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValueRange(pub u64, pub u64);

impl ValueRange {
  pub fn min(&self) -> u64 {
    self.0
  }

  pub fn max(&self) -> u64 {
    self.1
  }

  /// Whether `value` lies inside the range, honouring unset bounds.
  pub fn contains(&self, value: f64) -> bool {
    let lower_ok = self.0 == 0 || value >= self.0 as f64;
    let upper_ok = self.1 == 0 || value <= self.1 as f64;
    lower_ok && upper_ok
  }

  /// Build a range from server-declared bounds, rejecting inverted pairs.
  pub fn checked(min: u64, max: u64) -> Option<Self> {
    (min <= max).then_some(Self(min, max))
  }
}

impl fmt::Display for ValueRange {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}-{}", self.0, self.1)
  }
}

/// Filter values applied to the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterState {
  /// Room counts to include; empty means any
  pub rooms: BTreeSet<u32>,
  pub price_range: ValueRange,
  pub area_range: ValueRange,
}

impl FilterState {
  pub fn new(price_range: ValueRange, area_range: ValueRange) -> Self {
    Self {
      rooms: BTreeSet::new(),
      price_range,
      area_range,
    }
  }

  pub fn matches(&self, apartment: &Apartment) -> bool {
    if !self.rooms.is_empty() && !self.rooms.contains(&apartment.rooms) {
      return false;
    }
    self.price_range.contains(apartment.price as f64) && self.area_range.contains(apartment.area)
  }
}

/// Partial update to a draft filter. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct FilterPatch {
  pub rooms: Option<Vec<u32>>,
  pub price_range: Option<ValueRange>,
  pub area_range: Option<ValueRange>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
  #[default]
  Asc,
  Desc,
}

impl SortDirection {
  pub fn as_str(&self) -> &'static str {
    match self {
      SortDirection::Asc => "asc",
      SortDirection::Desc => "desc",
    }
  }

  /// Anything other than "desc" sorts ascending, like the backend does.
  pub fn parse(s: &str) -> Self {
    if s.eq_ignore_ascii_case("desc") {
      SortDirection::Desc
    } else {
      SortDirection::Asc
    }
  }
}

/// Active sort. An empty field means natural (first-seen) order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState {
  #[serde(default)]
  pub field: String,
  #[serde(default)]
  pub direction: SortDirection,
}

impl SortState {
  pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
    Self {
      field: field.into(),
      direction,
    }
  }

  pub fn is_natural(&self) -> bool {
    self.field.is_empty()
  }
}
