use std::future::Future;
use std::time::Duration;

use color_eyre::{eyre::eyre, Result};
use url::Url;

use super::api_types::decode_page;
use crate::error::SyncError;
use crate::listing::{Apartment, FilterState, SortState, ValueRange};

/// One page request against the listings endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
  pub offset: usize,
  pub limit: usize,
  pub sort: SortState,
  pub filters: FilterState,
}

impl PageRequest {
  /// Query parameters in wire form. Unset (zero) bounds, an empty room set
  /// and natural sort are left out.
  pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
    let mut pairs = vec![
      ("offset", self.offset.to_string()),
      ("limit", self.limit.to_string()),
    ];

    if !self.sort.is_natural() {
      pairs.push(("sortField", self.sort.field.clone()));
      pairs.push(("sortDir", self.sort.direction.as_str().to_string()));
    }

    if !self.filters.rooms.is_empty() {
      let rooms = self
        .filters
        .rooms
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(",");
      pairs.push(("rooms", rooms));
    }

    let bounds = [
      ("priceMin", self.filters.price_range.min()),
      ("priceMax", self.filters.price_range.max()),
      ("areaMin", self.filters.area_range.min()),
      ("areaMax", self.filters.area_range.max()),
    ];
    for (name, value) in bounds {
      if value != 0 {
        pairs.push((name, value.to_string()));
      }
    }

    pairs
  }
}

/// A decoded page of listings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingsPage {
  pub listings: Vec<Apartment>,
  /// Size of the whole result set, when the server declared a usable one
  pub total: Option<usize>,
  /// Available price bounds over the whole dataset
  pub price_range: Option<ValueRange>,
  /// Available area bounds over the whole dataset
  pub area_range: Option<ValueRange>,
}

/// Anything that answers listing page requests.
pub trait ListingSource: Send + Sync + 'static {
  fn fetch_page(
    &self,
    request: &PageRequest,
  ) -> impl Future<Output = Result<ListingsPage, SyncError>> + Send;
}

/// HTTP client for the listings endpoint
#[derive(Clone)]
pub struct HttpSource {
  client: reqwest::Client,
  endpoint: Url,
}

impl HttpSource {
  pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
    let endpoint =
      Url::parse(endpoint).map_err(|e| eyre!("Invalid backend url {}: {}", endpoint, e))?;

    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client, endpoint })
  }

  /// Full request url for a page.
  pub fn page_url(&self, request: &PageRequest) -> Url {
    let mut url = self.endpoint.clone();
    url.query_pairs_mut().clear().extend_pairs(request.query_pairs());
    url
  }
}

impl ListingSource for HttpSource {
  async fn fetch_page(&self, request: &PageRequest) -> Result<ListingsPage, SyncError> {
    let url = self.page_url(request);
    tracing::debug!(%url, "Fetching listings page");

    let response = self
      .client
      .get(url)
      .send()
      .await
      .map_err(|e| SyncError::Fetch(e.to_string()))?
      .error_for_status()
      .map_err(|e| SyncError::Fetch(e.to_string()))?;

    let body = response
      .bytes()
      .await
      .map_err(|e| SyncError::Fetch(e.to_string()))?;

    decode_page(&body)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::listing::SortDirection;

  fn request() -> PageRequest {
    PageRequest {
      offset: 10,
      limit: 5,
      sort: SortState::default(),
      filters: FilterState::new(ValueRange(0, 0), ValueRange(0, 0)),
    }
  }

  #[test]
  fn test_minimal_query() {
    let pairs = request().query_pairs();
    assert_eq!(
      pairs,
      vec![("offset", "10".to_string()), ("limit", "5".to_string())]
    );
  }

  #[test]
  fn test_full_query_url() {
    let mut req = request();
    req.sort = SortState::new("price", SortDirection::Desc);
    req.filters.rooms.extend([3, 1]);
    req.filters.price_range = ValueRange(100, 0);
    req.filters.area_range = ValueRange(30, 90);

    let source = HttpSource::new("http://localhost:3000/api/apartments", Duration::from_secs(5))
      .unwrap();
    let url = source.page_url(&req);
    assert_eq!(
      url.as_str(),
      "http://localhost:3000/api/apartments?offset=10&limit=5&sortField=price&sortDir=desc\
       &rooms=1%2C3&priceMin=100&areaMin=30&areaMax=90"
    );
  }

  #[test]
  fn test_invalid_endpoint() {
    assert!(HttpSource::new("not a url", Duration::from_secs(1)).is_err());
  }
}
