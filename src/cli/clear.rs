//! `stepreel clear` command implementation.

use super::open_store;
use crate::config::Config;
use crate::error::Result;
use crate::storage::StepStore;

/// Run the clear command.
///
/// # Errors
///
/// Returns an error if the storage backend fails.
pub fn run(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let removed = store.get_steps()?.len();
    store.clear_steps()?;

    if removed == 0 {
        println!("No steps to clear.");
    } else {
        println!("Cleared {removed} step(s).");
    }

    Ok(())
}
