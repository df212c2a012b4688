//! `stepreel replay` command implementation.
//!
//! Drives a scripted browsing session through the controller, coordinator and
//! probes over [`LocalHost`], persisting into the file store.

use super::open_store;
use crate::config::Config;
use crate::controller::Controller;
use crate::coordinator::{Coordinator, channel};
use crate::core::ElementSnapshot;
use crate::error::{Error, Result};
use crate::host::{LocalHost, StaticScreenshot};
use crate::protocol::PageHandle;
use crate::storage::StepStore;
use chrono::{TimeDelta, Utc};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// One scripted action.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Action {
    /// Open a page and make it current.
    Open {
        url: String,
        #[serde(default)]
        restricted: bool,
    },
    /// Start recording the current page.
    Start,
    /// Fire a DOM event on the current page.
    Event {
        kind: String,
        #[serde(default)]
        target: ElementSnapshot,
    },
    /// Let script time pass.
    Wait { ms: u64 },
    /// Cross-document navigation.
    Navigate { url: String },
    /// Same-document navigation.
    Route { url: String },
    Reload,
    /// Stop recording.
    Stop,
    /// Close the current page.
    Close,
    /// Delete a step (0-based) from the controller's list.
    Delete { index: usize },
}

/// Parse a replay script: a JSON array of actions.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a valid script.
pub fn load_script(path: &Path) -> Result<Vec<Action>> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| Error::InvalidFormat(format!("{}: {e}", path.display())))
}

/// Run the replay command.
///
/// # Errors
///
/// Returns an error if the script, screenshot or store cannot be read, or
/// any scripted action fails.
pub fn run(
    config: &Config,
    script: &Path,
    screenshot: Option<&Path>,
    export: Option<&Path>,
) -> Result<()> {
    let actions = load_script(script)?;
    let capture = match screenshot {
        Some(path) => StaticScreenshot::from_file(path)?,
        None => StaticScreenshot::unavailable(),
    };
    let store = Arc::new(open_store(config)?);
    let record_path = store.record_path();

    let runtime = tokio::runtime::Runtime::new()?;
    let mut controller = runtime.block_on(replay(store, capture, config, &actions))?;

    println!(
        "Replayed {} action(s): {} step(s) saved to {}",
        actions.len(),
        controller.steps().len(),
        record_path.display()
    );
    println!("Status: {}", controller.status());

    if let Some(path) = export {
        let html = controller.export()?;
        fs::write(path, html)?;
        println!("Exported slideshow to {}", path.display());
    }

    Ok(())
}

/// Play `actions` against a fresh in-process coordinator over `store`.
///
/// Returns the controller view as it stands after the last action.
///
/// # Errors
///
/// Returns the first action failure.
pub async fn replay(
    store: Arc<dyn StepStore>,
    capture: StaticScreenshot,
    config: &Config,
    actions: &[Action],
) -> Result<Controller> {
    let (coordinator, inbox) = channel();
    let host = Arc::new(LocalHost::new(coordinator.clone(), config.clone()));
    let task = Coordinator::new(store, host.clone(), Arc::new(capture), config.clone())
        .spawn(inbox);

    let mut controller = Controller::open(coordinator, host.clone(), config).await?;
    let mut page: Option<PageHandle> = None;
    let mut clock = Utc::now();

    for (n, action) in actions.iter().enumerate() {
        debug!(n, ?action, "replaying");
        let current = page.ok_or_else(|| no_page(n));

        match action {
            Action::Open { url, restricted } => {
                let opened = if *restricted {
                    host.open_restricted_page(url).await?
                } else {
                    host.open_page(url).await?
                };
                page = Some(opened);
            }
            Action::Start => controller.start_recording(current?).await?,
            Action::Event { kind, target } => {
                host.dispatch_at(current?, kind, target.clone(), clock)?;
            }
            Action::Wait { ms } => {
                let ms = i64::try_from(*ms).unwrap_or(i64::MAX);
                clock += TimeDelta::try_milliseconds(ms).unwrap_or(TimeDelta::MAX);
            }
            Action::Navigate { url } => {
                let p = current?;
                host.settle(p).await?;
                host.navigate(p, url).await?;
            }
            Action::Route { url } => {
                let p = current?;
                host.settle(p).await?;
                host.route_change(p, url)?;
            }
            Action::Reload => {
                let p = current?;
                host.settle(p).await?;
                host.reload(p).await?;
            }
            Action::Stop => {
                controller.stop_recording().await?;
            }
            Action::Close => {
                let p = current?;
                host.settle(p).await?;
                host.close(p).await?;
                page = None;
            }
            Action::Delete { index } => {
                controller.delete_step(*index).await?;
            }
        }
        controller.poll_notifications();
    }

    if controller.recording_page().is_some() {
        info!("script ended while recording, stopping");
        controller.stop_recording().await?;
    }
    drop(host);
    task.abort();
    Ok(controller)
}

fn no_page(n: usize) -> Error {
    Error::InvalidState(format!("action {}: no page is open", n + 1))
}
