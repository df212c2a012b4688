//! `stepreel steps` command implementation.

use super::open_store;
use crate::config::Config;
use crate::core::Step;
use crate::error::Result;
use crate::storage::StepStore;
use chrono::{DateTime, Local, Utc};

/// Maximum length for URL preview.
const URL_PREVIEW_LEN: usize = 50;

/// Run the steps command.
///
/// Lists persisted steps with their creation time, URL and events.
///
/// # Errors
///
/// Returns an error if the storage backend fails.
pub fn run(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let steps = store.get_steps()?;

    if steps.is_empty() {
        println!("No steps recorded.");
        println!("\nSteps are stored in: {}", store.record_path().display());
        return Ok(());
    }

    print!("{}", render_table(&steps));
    Ok(())
}

fn render_table(steps: &[Step]) -> String {
    let mut out = format!("{:<4} {:<17} {:<52} {:<4} Events\n", "#", "Created", "URL", "Shot");
    out.push_str(&"─".repeat(100));
    out.push('\n');

    for (index, step) in steps.iter().enumerate() {
        let events = if step.events.is_empty() {
            "(none)".to_string()
        } else {
            step.events
                .iter()
                .map(|e| e.kind.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        let shot = if step.screenshot.is_some() { "yes" } else { "no" };

        out.push_str(&format!(
            "{:<4} {:<17} {:<52} {:<4} {}\n",
            index + 1,
            format_local_time(step.created_at),
            format_url_preview(&step.page_url),
            shot,
            events
        ));
    }

    out.push_str(&"─".repeat(100));
    out.push_str(&format!("\nShowing {} step(s)\n", steps.len()));
    out
}

/// Format UTC time as local time for display.
fn format_local_time(utc: DateTime<Utc>) -> String {
    let local: DateTime<Local> = utc.into();
    local.format("%Y-%m-%d %H:%M").to_string()
}

fn format_url_preview(url: &str) -> String {
    if url.chars().count() > URL_PREVIEW_LEN {
        let head: String = url.chars().take(URL_PREVIEW_LEN - 3).collect();
        format!("{head}...")
    } else {
        url.to_string()
    }
}
