//! Client-side synchronization layer for listing data.
//!
//! This module provides the caching pieces the catalog is built from:
//! - An entity store that merges incoming batches by id with change detection
//! - A query cache of fetched pages keyed by filter/sort signature
//! - Draft vs. applied filter staging
//! - Pagination bookkeeping and the derived visible list
//! - A durable slot for the last applied filters

mod entities;
mod paginator;
mod queries;
mod staging;
mod storage;
mod traits;
mod visible;

pub use entities::EntityStore;
pub use paginator::Pagination;
pub use queries::QueryCache;
pub use staging::FilterStaging;
pub use storage::{NoopStorage, SavedFilters, SlotStorage, SqliteStorage, StoredSlot};
pub use traits::{CacheSource, Cacheable};
pub use visible::VisibleList;
