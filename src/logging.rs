//! Tracing setup: daily log files under the data directory, optionally
//! mirrored to stderr. Stdout is left to the session output.

use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::daily;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_DIRECTIVE: &str = "aptcat=info";

/// Directory the daily log files go to.
pub fn log_dir() -> Result<PathBuf> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?;

  Ok(data_dir.join("aptcat").join("logs"))
}

fn env_filter() -> EnvFilter {
  EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Install the global subscriber. Call once near the start of `main` and
/// hold the returned guard until exit, or buffered lines are lost.
pub fn init(verbose: bool) -> Result<WorkerGuard> {
  let dir = log_dir()?;
  std::fs::create_dir_all(&dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  // daily rolling file appender -> aptcat.log.YYYY-MM-DD
  let (writer, guard) = tracing_appender::non_blocking(daily(&dir, "aptcat.log"));

  let file_layer = fmt::layer()
    .with_writer(writer)
    .with_ansi(false)
    .with_target(true)
    .with_filter(env_filter());

  let stderr_layer = verbose.then(|| {
    fmt::layer()
      .compact()
      .with_writer(std::io::stderr)
      .with_filter(env_filter())
  });

  tracing_subscriber::registry()
    .with(file_layer)
    .with(stderr_layer)
    .try_init()
    .map_err(|e| eyre!("Failed to install tracing subscriber: {}", e))?;

  Ok(guard)
}
