//! Serde-deserializable types matching the listings endpoint response.
//!
//! These types are separate from domain types to allow lenient
//! deserialization: a response with a missing or non-numeric `total` or
//! range still yields its listings.

use serde::Deserialize;
use serde_json::Value;

use super::client::ListingsPage;
use crate::error::SyncError;
use crate::listing::{Apartment, ValueRange};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiListingsResponse {
  #[serde(default, alias = "apartments")]
  pub listings: Option<Value>,
  pub total: Option<Value>,
  pub price_min: Option<Value>,
  pub price_max: Option<Value>,
  pub area_min: Option<Value>,
  pub area_max: Option<Value>,
}

impl ApiListingsResponse {
  pub fn into_page(self) -> ListingsPage {
    let listings = match self.listings {
      Some(Value::Array(items)) => items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<Apartment>(item) {
          Ok(apartment) => Some(apartment),
          Err(e) => {
            tracing::warn!("Skipping malformed listing: {}", e);
            None
          }
        })
        .collect(),
      Some(other) => {
        tracing::warn!(kind = value_kind(&other), "Listings field is not an array");
        Vec::new()
      }
      None => Vec::new(),
    };

    let total = match self.total.as_ref().map(as_number) {
      Some(Some(n)) if n >= 1.0 => Some(n as usize),
      // Zero total: fall back to the batch length
      Some(Some(_)) => None,
      Some(None) | None => {
        tracing::warn!(raw = ?self.total, "Response total missing or non-numeric");
        None
      }
    };

    ListingsPage {
      listings,
      total,
      price_range: declared_range(self.price_min.as_ref(), self.price_max.as_ref()),
      area_range: declared_range(self.area_min.as_ref(), self.area_max.as_ref()),
    }
  }
}

/// Decode a response body into a page.
pub fn decode_page(body: &[u8]) -> Result<ListingsPage, SyncError> {
  let response: ApiListingsResponse =
    serde_json::from_slice(body).map_err(|e| SyncError::MalformedResponse(e.to_string()))?;
  Ok(response.into_page())
}

/// Numbers may arrive as JSON numbers or numeric strings.
fn as_number(value: &Value) -> Option<f64> {
  let n = match value {
    Value::Number(n) => n.as_f64()?,
    Value::String(s) => s.trim().parse().ok()?,
    _ => return None,
  };
  n.is_finite().then_some(n)
}

fn declared_range(min: Option<&Value>, max: Option<&Value>) -> Option<ValueRange> {
  let min = min.and_then(as_number)?;
  let max = max.and_then(as_number)?;
  if min < 0.0 {
    return None;
  }
  ValueRange::checked(min.floor() as u64, max.ceil() as u64)
}

fn value_kind(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "bool",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}
