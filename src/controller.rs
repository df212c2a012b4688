//! Controller: the user-facing client that starts, stops and exports.
//!
//! It owns no durable state. A fresh controller re-reads the persisted steps
//! from the coordinator, and everything it shows is derived from that copy.

use crate::config::{Config, ExportConfig};
use crate::coordinator::CoordinatorHandle;
use crate::core::Step;
use crate::error::{Error, Result};
use crate::export::render_slideshow;
use crate::host::PageHost;
use crate::protocol::{Command, MessageSender, Notification, PageHandle};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Origin the controller presents to the coordinator.
pub const CONTROLLER_ORIGIN: &str = "stepreel://controller";

/// User-visible status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Ready,
    Recording,
    Stopped,
    Exported,
    Failed(String),
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "Ready"),
            Self::Recording => write!(f, "Recording..."),
            Self::Stopped => write!(f, "Recording stopped"),
            Self::Exported => write!(f, "Export successful!"),
            Self::Failed(message) => write!(f, "Error: {message}"),
        }
    }
}

/// One open controller view.
pub struct Controller {
    coordinator: CoordinatorHandle,
    host: Arc<dyn PageHost>,
    sender: MessageSender,
    export: ExportConfig,
    steps: Vec<Step>,
    recording: Option<PageHandle>,
    status: Status,
    notifications: mpsc::UnboundedReceiver<Notification>,
}

impl Controller {
    /// Open a view: subscribe to notifications and load the persisted steps.
    ///
    /// # Errors
    ///
    /// Returns an error if the coordinator is gone or the store cannot be read.
    pub async fn open(
        coordinator: CoordinatorHandle,
        host: Arc<dyn PageHost>,
        config: &Config,
    ) -> Result<Self> {
        let notifications = coordinator.subscribe()?;
        let mut controller = Self {
            coordinator,
            host,
            sender: MessageSender::view(CONTROLLER_ORIGIN),
            export: config.export.clone(),
            steps: Vec::new(),
            recording: None,
            status: Status::Ready,
            notifications,
        };
        controller.refresh().await?;
        Ok(controller)
    }

    /// Steps as currently held by this view.
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    #[must_use]
    pub fn status(&self) -> &Status {
        &self.status
    }

    /// Page this view started recording, while it is recording.
    #[must_use]
    pub fn recording_page(&self) -> Option<PageHandle> {
        self.recording
    }

    /// Export is offered only while idle with something to show.
    #[must_use]
    pub fn can_export(&self) -> bool {
        self.recording.is_none() && !self.steps.is_empty()
    }

    /// Reload the persisted steps.
    ///
    /// # Errors
    ///
    /// Returns an error if the coordinator is gone or the store cannot be read.
    pub async fn refresh(&mut self) -> Result<()> {
        self.steps = self
            .coordinator
            .request(self.sender.clone(), Command::GetSteps)
            .await?
            .into_steps()?;
        Ok(())
    }

    /// Start recording `page`.
    ///
    /// # Errors
    ///
    /// Returns an error if the page refuses a probe or any party rejects the
    /// start. The view is back to idle afterwards.
    pub async fn start_recording(&mut self, page: PageHandle) -> Result<()> {
        match self.try_start(page).await {
            Ok(()) => {
                info!(%page, "recording");
                self.recording = Some(page);
                self.status = Status::Recording;
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn try_start(&self, page: PageHandle) -> Result<()> {
        self.host.check_access(page).await?;
        self.host.inject_probe(page).await?;
        self.coordinator
            .request(self.sender.clone(), Command::StartRecording { page })
            .await?;

        let started = match self.host.probe(page).await {
            Ok(probe) => probe.start_recording().await,
            Err(e) => Err(e),
        };
        if started.is_err() {
            // Do not leave the coordinator pointing at a page nobody records
            if let Err(e) = self
                .coordinator
                .request(self.sender.clone(), Command::StopRecording)
                .await
            {
                warn!(%page, error = %e, "failed to roll back start");
            }
        }
        started
    }

    /// Stop recording and take the probe's final steps.
    ///
    /// # Errors
    ///
    /// Returns an error if nothing is being recorded, the probe is gone, or
    /// the final steps are rejected. The view is back to idle afterwards.
    pub async fn stop_recording(&mut self) -> Result<&[Step]> {
        let Some(page) = self.recording.take() else {
            let e = Error::InvalidState("not recording".to_string());
            return Err(self.fail(e));
        };

        let flushed = self.try_flush(page).await;
        let stopped = self
            .coordinator
            .request(self.sender.clone(), Command::StopRecording)
            .await;

        match flushed.and(stopped) {
            Ok(_) => {
                info!(%page, steps = self.steps.len(), "recording stopped");
                self.status = Status::Stopped;
                Ok(&self.steps)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn try_flush(&mut self, page: PageHandle) -> Result<()> {
        let steps = self.host.probe(page).await?.stop_recording().await?;
        if steps.is_empty() {
            return Ok(());
        }
        self.coordinator
            .request(
                self.sender.clone(),
                Command::UpdateSteps {
                    steps: steps.clone(),
                },
            )
            .await?;
        self.steps = steps;
        Ok(())
    }

    /// Delete one step and persist the rest.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is out of range or the write is rejected;
    /// the held steps are unchanged in that case.
    pub async fn delete_step(&mut self, index: usize) -> Result<Step> {
        if index >= self.steps.len() {
            return Err(Error::InvalidState(format!(
                "no step {} (have {})",
                index + 1,
                self.steps.len()
            )));
        }

        let mut remaining = self.steps.clone();
        let removed = remaining.remove(index);
        self.coordinator
            .request(
                self.sender.clone(),
                Command::UpdateSteps {
                    steps: remaining.clone(),
                },
            )
            .await?;
        self.steps = remaining;
        Ok(removed)
    }

    /// Drop every persisted step.
    ///
    /// # Errors
    ///
    /// Returns an error if the coordinator rejects the reset.
    pub async fn clear_steps(&mut self) -> Result<()> {
        self.coordinator
            .request(self.sender.clone(), Command::ClearSteps)
            .await?;
        self.steps.clear();
        Ok(())
    }

    /// Apply notifications received since the last poll.
    pub fn poll_notifications(&mut self) -> Vec<Notification> {
        let mut seen = Vec::new();
        while let Ok(notification) = self.notifications.try_recv() {
            match notification {
                Notification::RecordingStopped { page } if self.recording == Some(page) => {
                    self.recording = None;
                    self.status = Status::Stopped;
                }
                Notification::RecordingStopped { .. } => {}
            }
            seen.push(notification);
        }
        seen
    }

    /// Render the held steps as a slideshow.
    ///
    /// # Errors
    ///
    /// Returns an error if there is nothing to export.
    pub fn export(&mut self) -> Result<String> {
        if self.steps.is_empty() {
            let e = Error::InvalidState("No steps to export".to_string());
            return Err(self.fail(e));
        }
        let html = render_slideshow(&self.steps, &self.export.title);
        self.status = Status::Exported;
        Ok(html)
    }

    /// File name suggested for an export.
    #[must_use]
    pub fn export_file_name(&self) -> &str {
        &self.export.file_name
    }

    fn fail(&mut self, e: Error) -> Error {
        warn!(error = %e, "controller action failed");
        self.recording = None;
        self.status = Status::Failed(e.to_string());
        e
    }
}
