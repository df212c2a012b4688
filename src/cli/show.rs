//! `stepreel show` command implementation.

use super::open_store;
use crate::config::Config;
use crate::core::Step;
use crate::error::{Error, Result};
use crate::storage::StepStore;

/// Run the show command.
///
/// Prints one step (1-based) as pretty JSON.
///
/// # Errors
///
/// Returns an error if the storage backend fails or there is no such step.
pub fn run(config: &Config, number: usize) -> Result<()> {
    let store = open_store(config)?;
    let step = pick(store.get_steps()?, number)?;

    let json = serde_json::to_string_pretty(&step)?;
    println!("{json}");

    Ok(())
}

fn pick(steps: Vec<Step>, number: usize) -> Result<Step> {
    let count = steps.len();
    number
        .checked_sub(1)
        .and_then(|index| steps.into_iter().nth(index))
        .ok_or_else(|| Error::InvalidState(format!("No step {number} ({count} recorded)")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn steps() -> Vec<Step> {
        vec![
            Step::open("https://a.test/1", None, Utc::now()),
            Step::open("https://a.test/2", None, Utc::now()),
        ]
    }

    #[test]
    fn pick_is_one_based() {
        assert_eq!(pick(steps(), 1).unwrap().page_url, "https://a.test/1");
        assert_eq!(pick(steps(), 2).unwrap().page_url, "https://a.test/2");
    }

    #[test]
    fn pick_out_of_range() {
        assert!(pick(steps(), 0).is_err());
        let err = pick(steps(), 3).unwrap_err();
        assert!(err.to_string().contains("No step 3 (2 recorded)"));
    }
}
