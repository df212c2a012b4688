//! `stepreel export` command implementation.

use super::open_store;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::export::render_slideshow;
use crate::storage::StepStore;
use std::fs;
use std::path::{Path, PathBuf};

/// Run the export command.
///
/// Writes the persisted steps as an HTML slideshow to `output`, or to the
/// configured file name in the current directory.
///
/// # Errors
///
/// Returns an error if there are no steps or the file cannot be written.
pub fn run(config: &Config, output: Option<&Path>) -> Result<()> {
    let store = open_store(config)?;
    let steps = store.get_steps()?;
    if steps.is_empty() {
        return Err(Error::InvalidState("No steps to export".to_string()));
    }

    let path = output.map_or_else(|| PathBuf::from(&config.export.file_name), Path::to_path_buf);
    fs::write(&path, render_slideshow(&steps, &config.export.title))?;
    println!("Exported {} step(s) to {}", steps.len(), path.display());

    Ok(())
}
