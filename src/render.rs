//! Plain-text rendering of catalog state for the session.

use std::fmt::Write;

use crate::catalog::{CatalogSnapshot, LoadOutcome};
use crate::commands::COMMANDS;
use crate::listing::{Apartment, FilterState};

/// Group digits in threes: 5500000 -> "5 500 000".
pub fn format_price(price: u64) -> String {
  let digits = price.to_string();
  let mut out = String::with_capacity(digits.len() + digits.len() / 3);
  for (i, ch) in digits.chars().enumerate() {
    if i > 0 && (digits.len() - i) % 3 == 0 {
      out.push(' ');
    }
    out.push(ch);
  }
  out
}

pub fn listing_line(index: usize, apartment: &Apartment) -> String {
  format!(
    "{:>3}. {:<24} {:>2}r {:>6.1} m2  floor {:>2}/{:<2} {:>12}  [{}]",
    index + 1,
    apartment.name,
    apartment.rooms,
    apartment.area,
    apartment.floor,
    apartment.total_floors,
    format_price(apartment.price),
    apartment.id
  )
}

fn filter_summary(filters: &FilterState) -> String {
  let rooms = if filters.rooms.is_empty() {
    "any".to_string()
  } else {
    filters
      .rooms
      .iter()
      .map(|r| r.to_string())
      .collect::<Vec<_>>()
      .join(",")
  };
  format!(
    "rooms {} | price {} | area {}",
    rooms, filters.price_range, filters.area_range
  )
}

/// Header lines followed by every visible listing.
pub fn snapshot(snapshot: &CatalogSnapshot) -> String {
  let mut out = String::new();
  let pagination = &snapshot.pagination;

  let sort = if snapshot.sort.is_natural() {
    "natural".to_string()
  } else {
    format!("{} {}", snapshot.sort.field, snapshot.sort.direction.as_str())
  };
  let _ = writeln!(
    out,
    "Showing {} of {} ({} stored) | page {} | sort {}{}",
    snapshot.listings.len(),
    pagination.total_items,
    snapshot.stored,
    pagination.current_page,
    sort,
    if pagination.has_more { "" } else { " | end" }
  );
  let _ = writeln!(
    out,
    "Filters: {} ({} active)",
    filter_summary(&snapshot.applied),
    snapshot.active_filters
  );
  if snapshot.draft != snapshot.applied {
    let _ = writeln!(out, "Draft:   {} (not applied)", filter_summary(&snapshot.draft));
  }
  let _ = writeln!(
    out,
    "Available: price {} | area {}",
    snapshot.price_bounds, snapshot.area_bounds
  );
  let _ = writeln!(
    out,
    "Cache: {} queries, current {}{}",
    snapshot.cached_queries,
    snapshot.signature.short_hash(),
    if snapshot.cache_complete { ", complete" } else { "" }
  );
  let flags = &snapshot.flags;
  if flags.loading || flags.appending || flags.filtering {
    let _ = writeln!(
      out,
      "Busy:{}{}{}",
      if flags.loading { " loading" } else { "" },
      if flags.appending { " appending" } else { "" },
      if flags.filtering { " filtering" } else { "" }
    );
  }
  if let Some(error) = &snapshot.error {
    let _ = writeln!(out, "Error: {}", error);
  }

  if snapshot.listings.is_empty() {
    out.push_str("  (no listings match)\n");
  }
  for (i, apartment) in snapshot.listings.iter().enumerate() {
    let _ = writeln!(out, "{}", listing_line(i, apartment));
  }
  out
}

/// One line describing a load result.
pub fn outcome(outcome: &LoadOutcome) -> String {
  match outcome {
    LoadOutcome::Loaded { source, count } => format!("Loaded {} listings ({:?})", count, source),
    LoadOutcome::Skipped => "Nothing to load".to_string(),
    LoadOutcome::Stale => "Late response merged".to_string(),
  }
}

pub fn help() -> String {
  let mut out = String::new();
  for cmd in COMMANDS {
    let _ = writeln!(
      out,
      "  {:<30} {} ({})",
      cmd.usage,
      cmd.description,
      cmd.aliases.join(", ")
    );
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backend::LocalSource;
  use crate::cache::NoopStorage;
  use crate::catalog::{Catalog, CatalogOptions};

  #[test]
  fn test_format_price() {
    assert_eq!(format_price(0), "0");
    assert_eq!(format_price(950), "950");
    assert_eq!(format_price(5_500_000), "5 500 000");
    assert_eq!(format_price(18_900_000), "18 900 000");
  }

  #[test]
  fn test_listing_line() {
    let apartment = Apartment {
      id: "7".to_string(),
      name: "Apt 7".to_string(),
      area: 41.25,
      floor: 3,
      total_floors: 17,
      price: 7_250_000,
      rooms: 2,
      plan_image: String::new(),
    };
    let line = listing_line(0, &apartment);
    assert!(line.starts_with("  1. Apt 7"));
    assert!(line.contains("7 250 000"));
    assert!(line.contains("41.2 m2") || line.contains("41.3 m2"));
    assert!(line.ends_with("[7]"));
  }

  #[test]
  fn test_help_lists_every_command() {
    let text = help();
    assert_eq!(text.lines().count(), COMMANDS.len());
    assert!(text.contains("prefetch <n,...>"));
  }

  #[test]
  fn test_snapshot_shows_busy_flags_and_error() {
    let catalog = Catalog::new(
      LocalSource::new(Vec::new()),
      NoopStorage,
      CatalogOptions::default(),
    );
    let mut state = catalog.snapshot();
    let idle = snapshot(&state);
    assert!(!idle.contains("Busy:"));
    assert!(idle.contains(&format!("current {}", state.signature.short_hash())));
    assert!(idle.contains("(no listings match)"));

    state.flags.appending = true;
    state.error = Some("Failed to load listings: timeout".to_string());
    let busy = snapshot(&state);
    assert!(busy.contains("Busy: appending\n"));
    assert!(busy.contains("Error: Failed to load listings: timeout"));
  }
}
