//! Command handlers. Each command prints its result as JSON on stdout; logs go
//! to stderr.

pub mod config;
pub mod image;
pub mod task;
pub mod upload;
pub mod worker;

use std::path::{Path, PathBuf};

use anyhow::Context;
use darkroom_core::{Config, Darkroom};
use serde::Serialize;

/// Expand `~` in a user-supplied path.
pub fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

pub(crate) fn open(config: Config) -> anyhow::Result<Darkroom> {
    let data_dir = config.data_dir();
    Darkroom::open(config)
        .with_context(|| format!("Failed to open data directory {}", data_dir.display()))
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
