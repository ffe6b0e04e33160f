//! Listing domain types, sort keys and cache signatures.

pub mod signature;
pub mod sort;
pub mod types;

pub use signature::{Fingerprint, QuerySignature};
pub use types::{Apartment, FilterPatch, FilterState, SortDirection, SortState, ValueRange};
