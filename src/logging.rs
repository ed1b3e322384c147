use std::fs::{self, File, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

/// Route tracing output to a log file. The terminal belongs to the UI, so
/// nothing is written to stdout or stderr.
pub fn configure_logging() -> Result<PathBuf> {
    let path = log_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file: File = OpenOptions::new().create(true).append(true).open(&path)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let file_log = fmt::layer()
        .compact()
        .with_ansi(false)
        .with_target(false)
        .with_writer(Mutex::new(file));
    let subscriber = Registry::default().with(filter).with(file_log);

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(path)
}

fn log_path() -> Result<PathBuf> {
    let cache_dir = dirs::cache_dir()
        .ok_or_else(|| anyhow!("Could not determine cache directory"))?;
    Ok(cache_dir.join("codegenie").join("codegenie.log"))
}
