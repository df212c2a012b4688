//! CLI command implementations.

pub mod clear;
pub mod export;
pub mod replay;
pub mod show;
pub mod steps;

use crate::config::Config;
use crate::error::Result;
use crate::storage::FileBackend;

/// File store at the configured storage path.
///
/// # Errors
///
/// Returns an error if the storage directory cannot be created.
pub fn open_store(config: &Config) -> Result<FileBackend> {
    FileBackend::new(config.storage.path.clone())
}
