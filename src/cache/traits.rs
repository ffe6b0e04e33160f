//! Core traits and types for the caching system.

use crate::listing::Fingerprint;

/// Trait for entities that can be cached.
///
/// Implementors provide a unique cache key and a fingerprint over the fields
/// whose change should count as an update.
pub trait Cacheable: Clone {
  /// Unique identifier for this entity (e.g., listing id)
  fn cache_key(&self) -> &str;

  /// Digest of the significant fields. Equal fingerprints mean the stored
  /// copy is left as is.
  fn fingerprint(&self) -> Fingerprint;

  /// Entity type name for storage organization (e.g., "apartment")
  fn entity_type() -> &'static str;
}

/// Indicates where a loaded page came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from the backend
  Network,
  /// Served from the query cache without a network call
  Cache,
}
