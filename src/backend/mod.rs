//! Access to the listings endpoint.

pub mod api_types;
pub mod client;
pub mod local;

pub use client::{HttpSource, ListingSource, ListingsPage, PageRequest};
pub use local::LocalSource;
