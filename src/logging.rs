//! Tracing setup for the binary
//!
//! Every run writes to the console and to its own timestamped file under the
//! log directory. `RUST_LOG` overrides the default filter.

use crate::error::{Result, ScoreError};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub const DEFAULT_FILTER: &str = "score_predictor=info,tower_http=info";

/// `<log_dir>/<YYYY-MM-DD_HH-MM-SS>.log`
pub fn log_file_path(log_dir: &Path) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
    log_dir.join(format!("{}.log", stamp))
}

/// Install the global subscriber and return the path of this run's log file.
pub fn init(log_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(log_dir)?;
    let path = log_file_path(log_dir);
    let file = File::create(&path)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .try_init()
        .map_err(|e| ScoreError::ConfigError(format!("logging already initialised: {}", e)))?;

    Ok(path)
}
