use thiserror::Error;

/// Recoverable failures of catalog operations.
///
/// None of these are fatal: the catalog keeps its last good state and
/// surfaces the message of the most recent failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
  /// Network or backend error while loading a page
  #[error("Failed to load listings: {0}")]
  Fetch(String),

  /// Backend answered with something that isn't a listings response
  #[error("Malformed listings response: {0}")]
  MalformedResponse(String),

  /// The saved-filters slot couldn't be read or written
  #[error("Saved filters unavailable: {0}")]
  Persistence(String),
}
