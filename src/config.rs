use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::catalog::{CatalogOptions, MAX_PAGE_SIZE};
use crate::listing::ValueRange;

/// Environment variable overriding `backend.url`
pub const BACKEND_URL_ENV: &str = "APTCAT_BACKEND_URL";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub backend: BackendConfig,
  #[serde(default)]
  pub catalog: CatalogConfig,
  #[serde(default)]
  pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
  /// Listings endpoint
  pub url: String,
  /// Serve listings from a JSON dataset instead of the endpoint
  pub data_file: Option<PathBuf>,
  pub timeout_secs: u64,
}

impl Default for BackendConfig {
  fn default() -> Self {
    Self {
      url: "http://localhost:3000/api/apartments".to_string(),
      data_file: None,
      timeout_secs: 10,
    }
  }
}

impl BackendConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs.max(1))
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
  pub items_per_page: usize,
  pub prefetch_page_size: usize,
  pub price_range: ValueRange,
  pub area_range: ValueRange,
}

impl Default for CatalogConfig {
  fn default() -> Self {
    let options = CatalogOptions::default();
    Self {
      items_per_page: options.items_per_page,
      prefetch_page_size: options.prefetch_page_size,
      price_range: options.price_range,
      area_range: options.area_range,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
  /// Keep applied filters across sessions
  pub enabled: bool,
  /// Database file (default: <data_dir>/aptcat/state.db)
  pub path: Option<PathBuf>,
}

impl Default for StorageConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      path: None,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./aptcat.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/aptcat/config.yaml
  ///
  /// Without any file the defaults apply. `APTCAT_BACKEND_URL` overrides
  /// the backend url either way.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };

    if let Ok(url) = std::env::var(BACKEND_URL_ENV) {
      if !url.trim().is_empty() {
        config.backend.url = url;
      }
    }

    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("aptcat.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("aptcat").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))?;

    let catalog = &config.catalog;
    if ValueRange::checked(catalog.price_range.min(), catalog.price_range.max()).is_none() {
      return Err(eyre!("catalog.price_range must be [min, max] with min <= max"));
    }
    if ValueRange::checked(catalog.area_range.min(), catalog.area_range.max()).is_none() {
      return Err(eyre!("catalog.area_range must be [min, max] with min <= max"));
    }

    Ok(config)
  }

  /// Catalog settings with page sizes clamped to what the endpoint serves.
  pub fn catalog_options(&self) -> CatalogOptions {
    CatalogOptions {
      items_per_page: self.catalog.items_per_page.clamp(1, MAX_PAGE_SIZE),
      prefetch_page_size: self.catalog.prefetch_page_size.clamp(1, MAX_PAGE_SIZE),
      price_range: self.catalog.price_range,
      area_range: self.catalog.area_range,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_file_uses_defaults() {
    let config = Config::parse("{}").unwrap();
    assert_eq!(config.catalog.items_per_page, 5);
    assert_eq!(config.catalog.prefetch_page_size, 50);
    assert_eq!(config.catalog.price_range, ValueRange(5_500_000, 18_900_000));
    assert_eq!(config.catalog.area_range, ValueRange(33, 123));
    assert!(config.storage.enabled);
    assert!(config.backend.data_file.is_none());
  }

  #[test]
  fn test_partial_sections() {
    let yaml = r#"
backend:
  url: https://example.com/api/apartments
  timeout_secs: 3
catalog:
  items_per_page: 10
  area_range: [20, 200]
storage:
  enabled: false
"#;
    let config = Config::parse(yaml).unwrap();
    assert_eq!(config.backend.url, "https://example.com/api/apartments");
    assert_eq!(config.backend.timeout(), Duration::from_secs(3));
    assert_eq!(config.catalog.items_per_page, 10);
    assert_eq!(config.catalog.prefetch_page_size, 50);
    assert_eq!(config.catalog.area_range, ValueRange(20, 200));
    assert!(!config.storage.enabled);

    let options = config.catalog_options();
    assert_eq!(options.items_per_page, 10);
    assert_eq!(options.price_range, ValueRange(5_500_000, 18_900_000));
  }

  #[test]
  fn test_inverted_range_rejected() {
    let yaml = "catalog:\n  price_range: [9000000, 1000000]\n";
    assert!(Config::parse(yaml).is_err());
  }

  #[test]
  fn test_missing_explicit_path() {
    let err = Config::load(Some(Path::new("/nonexistent/aptcat.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }

  #[test]
  fn test_zero_page_size_is_clamped() {
    let config = Config::parse("catalog:\n  items_per_page: 0\n").unwrap();
    assert_eq!(config.catalog_options().items_per_page, 1);
  }

  #[test]
  fn test_oversized_page_sizes_are_capped() {
    let yaml = "catalog:\n  items_per_page: 150\n  prefetch_page_size: 200\n";
    let options = Config::parse(yaml).unwrap().catalog_options();
    assert_eq!(options.items_per_page, 100);
    assert_eq!(options.prefetch_page_size, 100);
  }
}
