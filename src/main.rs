mod backend;
mod cache;
mod catalog;
mod commands;
mod config;
mod error;
mod listing;
mod logging;
mod render;

use clap::Parser;
use color_eyre::Result;
use futures::future::try_join_all;
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use backend::{HttpSource, ListingSource, LocalSource};
use cache::{NoopStorage, SlotStorage, SqliteStorage};
use catalog::{Catalog, LoadOutcome};
use commands::SessionCommand;
use config::Config;
use error::SyncError;
use listing::FilterPatch;

#[derive(Parser, Debug)]
#[command(name = "aptcat")]
#[command(about = "Browse a paginated apartment catalog with a local sync cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/aptcat/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Listings endpoint (overrides backend.url)
  #[arg(short, long)]
  url: Option<String>,

  /// Serve listings from a local JSON dataset instead of the endpoint
  #[arg(short, long)]
  data: Option<PathBuf>,

  /// Listings per page
  #[arg(long)]
  per_page: Option<usize>,

  /// Print the first N pages and exit instead of starting a session
  #[arg(long)]
  pages: Option<usize>,

  /// Mirror logs to stderr
  #[arg(short, long)]
  verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _guard = logging::init(args.verbose)?;

  // Load configuration
  let mut config = Config::load(args.config.as_deref())?;

  // Command-line overrides
  if let Some(url) = &args.url {
    config.backend.url = url.clone();
  }
  if let Some(data) = &args.data {
    config.backend.data_file = Some(data.clone());
  }
  if let Some(per_page) = args.per_page {
    config.catalog.items_per_page = per_page;
  }

  match &config.backend.data_file {
    Some(path) => {
      let source = LocalSource::from_path(path)?;
      with_storage(source, &config, &args).await
    }
    None => {
      info!(url = %config.backend.url, "Using listings endpoint");
      let source = HttpSource::new(&config.backend.url, config.backend.timeout())?;
      with_storage(source, &config, &args).await
    }
  }
}

async fn with_storage<S: ListingSource>(source: S, config: &Config, args: &Args) -> Result<()> {
  let options = config.catalog_options();

  if !config.storage.enabled {
    return run(Catalog::new(source, NoopStorage, options), args).await;
  }

  let opened = match &config.storage.path {
    Some(path) => SqliteStorage::open_at(path),
    None => SqliteStorage::open(),
  };
  let storage = match opened {
    Ok(storage) => storage,
    Err(e) => {
      warn!("Storage unavailable, filters kept for this session only: {}", e);
      SqliteStorage::open_in_memory()?
    }
  };
  run(Catalog::new(source, storage, options), args).await
}

async fn run<S: ListingSource, P: SlotStorage>(catalog: Catalog<S, P>, args: &Args) -> Result<()> {
  if let Err(e) = catalog.init().await {
    eprintln!("Error: {}", e);
  }

  match args.pages {
    Some(pages) => {
      if let Err(e) = load_pages(&catalog, pages).await {
        eprintln!("Error: {}", e);
      }
      print!("{}", render::snapshot(&catalog.snapshot()));
      Ok(())
    }
    None => session(&catalog).await,
  }
}

/// Append until `pages` pages are loaded or the list ends. A failed page
/// stops the loop; what was loaded before it stays.
async fn load_pages<S: ListingSource, P: SlotStorage>(
  catalog: &Catalog<S, P>,
  pages: usize,
) -> Result<(), SyncError> {
  for _ in 1..pages {
    if catalog.load_more().await? == LoadOutcome::Skipped {
      break;
    }
  }
  Ok(())
}

/// Interactive line-based session over stdin.
async fn session<S: ListingSource, P: SlotStorage>(catalog: &Catalog<S, P>) -> Result<()> {
  print!("{}", render::snapshot(&catalog.snapshot()));
  println!("Type help for commands.");

  let mut lines = BufReader::new(tokio::io::stdin()).lines();
  loop {
    print!("aptcat> ");
    std::io::stdout().flush()?;

    let Some(line) = lines.next_line().await? else {
      break;
    };
    if line.trim().is_empty() {
      continue;
    }

    let command = match commands::parse(&line) {
      Ok(command) => command,
      Err(e) => {
        println!("{}", e);
        continue;
      }
    };

    if command == SessionCommand::Quit {
      break;
    }
    if let Err(e) = execute(catalog, command).await {
      println!("Error: {}", e);
    }
  }

  Ok(())
}

async fn execute<S: ListingSource, P: SlotStorage>(
  catalog: &Catalog<S, P>,
  command: SessionCommand,
) -> Result<(), SyncError> {
  match command {
    SessionCommand::More => {
      let outcome = catalog.load_more().await?;
      println!("{}", render::outcome(&outcome));
      print!("{}", render::snapshot(&catalog.snapshot()));
    }
    SessionCommand::Rooms(rooms) => catalog.set_draft(FilterPatch {
      rooms: Some(rooms),
      ..Default::default()
    }),
    SessionCommand::Price(range) => catalog.set_draft(FilterPatch {
      price_range: Some(range),
      ..Default::default()
    }),
    SessionCommand::Area(range) => catalog.set_draft(FilterPatch {
      area_range: Some(range),
      ..Default::default()
    }),
    SessionCommand::Apply => {
      let outcome = catalog.apply_filters().await?;
      if outcome == LoadOutcome::Skipped {
        println!("Filters unchanged");
      }
      print!("{}", render::snapshot(&catalog.snapshot()));
    }
    SessionCommand::Reset => {
      if catalog.reset_filters().await {
        catalog.load_apartments(true).await?;
      }
      print!("{}", render::snapshot(&catalog.snapshot()));
    }
    SessionCommand::Sort(field, direction) => {
      catalog.apply_sort(&field, direction).await?;
      print!("{}", render::snapshot(&catalog.snapshot()));
    }
    SessionCommand::Prefetch(rooms) => {
      let mut revisions = catalog.subscribe();
      let prefetch = try_join_all(rooms.iter().map(|&r| catalog.load_room(r)));
      let progress = async {
        while revisions.changed().await.is_ok() {
          print!("\r{} listings stored", catalog.snapshot().stored);
          let _ = std::io::stdout().flush();
        }
      };
      let outcomes = tokio::select! {
        result = prefetch => result?,
        _ = progress => Vec::new(),
      };
      println!();
      for (rooms, outcome) in rooms.iter().zip(&outcomes) {
        println!("{} rooms: {}", rooms, render::outcome(outcome));
      }
    }
    SessionCommand::Show => print!("{}", render::snapshot(&catalog.snapshot())),
    SessionCommand::Reload { hard } => {
      let outcome = if hard {
        catalog.hard_reset().await?
      } else {
        catalog.load_apartments(true).await?
      };
      println!("{}", render::outcome(&outcome));
      print!("{}", render::snapshot(&catalog.snapshot()));
    }
    SessionCommand::Help => print!("{}", render::help()),
    SessionCommand::Quit => {}
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use backend::{ListingsPage, PageRequest};
  use catalog::CatalogOptions;
  use listing::Apartment;

  fn apartment(i: u64) -> Apartment {
    Apartment {
      id: format!("apt-{}", i),
      name: format!("Apt {}", i),
      area: 45.0,
      floor: 2,
      total_floors: 9,
      price: 6_000_000,
      rooms: 2,
      plan_image: String::new(),
    }
  }

  /// Serves the first page, then fails every append.
  struct FirstPageOnly;

  impl ListingSource for FirstPageOnly {
    async fn fetch_page(&self, request: &PageRequest) -> Result<ListingsPage, SyncError> {
      if request.offset > 0 {
        return Err(SyncError::Fetch("connection reset".to_string()));
      }
      Ok(ListingsPage {
        listings: (0..request.limit as u64).map(apartment).collect(),
        total: Some(20),
        price_range: None,
        area_range: None,
      })
    }
  }

  #[tokio::test]
  async fn test_failed_page_keeps_loaded_listings() {
    let catalog = Catalog::new(FirstPageOnly, NoopStorage, CatalogOptions::default());
    catalog.init().await.unwrap();

    let err = load_pages(&catalog, 3).await.unwrap_err();
    assert!(matches!(err, SyncError::Fetch(_)));

    let snapshot = catalog.snapshot();
    assert_eq!(snapshot.listings.len(), 5);
    assert!(snapshot.error.is_some());
    assert!(render::snapshot(&snapshot).contains("Error: Failed to load listings"));
  }

  #[tokio::test]
  async fn test_load_pages_stops_at_end_of_list() {
    let source = LocalSource::new((0..7).map(apartment).collect());
    let catalog = Catalog::new(source, NoopStorage, CatalogOptions::default());
    catalog.init().await.unwrap();

    load_pages(&catalog, 10).await.unwrap();
    assert_eq!(catalog.snapshot().listings.len(), 7);
  }
}
