//! Coordinator: owns the recording session and brokers every command.
//!
//! Each inbound message is handled to completion before the next one starts,
//! which serializes all store writes without locks. Faults never leave a
//! handler as anything but a [`Fault`] in the response envelope.

pub mod handle;
pub mod session;

pub use handle::{CoordinatorHandle, CoordinatorInbox, Inbound, PageLink, channel};
pub use session::RecordingSession;

use crate::config::Config;
use crate::core::Step;
use crate::error::{Error, Result};
use crate::host::{PageHost, ScreenshotCapture};
use crate::protocol::{
    Command, Fault, MessageSender, Notification, PageHandle, ProbeCommand, Reply, Response,
};
use crate::storage::StepStore;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// State and protocol authority for one extension process.
pub struct Coordinator {
    session: RecordingSession,
    host: Arc<dyn PageHost>,
    screenshots: Arc<dyn ScreenshotCapture>,
    config: Config,
    listeners: Vec<mpsc::UnboundedSender<Notification>>,
}

impl Coordinator {
    /// Create a coordinator over its store and host capabilities.
    pub fn new(
        store: Arc<dyn StepStore>,
        host: Arc<dyn PageHost>,
        screenshots: Arc<dyn ScreenshotCapture>,
        config: Config,
    ) -> Self {
        Self {
            session: RecordingSession::new(store),
            host,
            screenshots,
            config,
            listeners: Vec::new(),
        }
    }

    /// The session state.
    #[must_use]
    pub fn session(&self) -> &RecordingSession {
        &self.session
    }

    /// First-install initialization: start from an empty record.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn install(&mut self) -> Result<()> {
        info!("initializing empty step record");
        self.session.reset()
    }

    /// Best-effort cleanup when the process is suspended.
    pub fn suspend(&mut self) {
        if let Err(e) = self.session.reset() {
            warn!(error = %e, "cleanup on suspend failed");
        }
    }

    /// Register a controller view for notifications.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<Notification> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.retain(|listener| !listener.is_closed());
        self.listeners.push(tx);
        rx
    }

    /// Handle a typed command.
    pub async fn handle(&mut self, sender: &MessageSender, command: Command) -> Response {
        let name = command.name();
        let result = match verify(sender) {
            Ok(()) => self.dispatch(sender, command).await,
            Err(e) => Err(e),
        };
        into_response(name, result)
    }

    /// Handle a raw JSON message. The sender is verified before the payload
    /// is even decoded.
    pub async fn handle_raw(&mut self, sender: &MessageSender, payload: Value) -> Response {
        let result = match verify(sender).and_then(|()| Command::decode(payload)) {
            Ok(command) => return self.handle(sender, command).await,
            Err(e) => Err(e),
        };
        into_response("<raw>", result)
    }

    async fn dispatch(&mut self, sender: &MessageSender, command: Command) -> Result<Reply> {
        match command {
            Command::StartRecording { page } => {
                if let Some(previous) = self.session.start(page) {
                    debug!(%previous, %page, "recording moved to another page");
                }
                info!(%page, "recording started");
                Ok(Reply::Ack)
            }
            Command::StopRecording => {
                if let Some(page) = self.session.stop() {
                    info!(%page, "recording stopped");
                }
                Ok(Reply::Ack)
            }
            Command::UpdateSteps { steps } => {
                self.update_steps(&steps)?;
                Ok(Reply::Ack)
            }
            Command::GetSteps => Ok(Reply::Steps(self.session.steps()?)),
            Command::ClearSteps => {
                self.session.clear_steps()?;
                Ok(Reply::Ack)
            }
            Command::CaptureScreenshot => {
                let page = sender
                    .page
                    .or(self.session.active_page())
                    .ok_or(Error::NoActiveTarget)?;
                Ok(Reply::Screenshot(self.capture(page).await?))
            }
        }
    }

    /// Validate and persist a full step sequence. Prior state is untouched
    /// when the payload is rejected.
    fn update_steps(&self, steps: &[Step]) -> Result<()> {
        let limit = self.config.limits.max_payload_bytes;
        let size = serde_json::to_vec(steps)?.len();
        if size > limit {
            return Err(Error::TooLarge { size, limit });
        }

        let sanitized: Vec<Step> = steps
            .iter()
            .map(|s| s.sanitized(&self.config.limits))
            .collect();
        self.session.replace_steps(&sanitized)?;
        debug!(steps = sanitized.len(), bytes = size, "steps persisted");
        Ok(())
    }

    async fn capture(&self, page: PageHandle) -> Result<String> {
        let deadline = Duration::from_millis(self.config.capture.timeout_ms);
        let capture = self
            .screenshots
            .capture_visible(page, self.config.capture.quality);

        match tokio::time::timeout(deadline, capture).await {
            Ok(Ok(data_url)) => Ok(data_url),
            Ok(Err(Error::CaptureFailed(msg))) => Err(Error::CaptureFailed(msg)),
            Ok(Err(e)) => Err(Error::CaptureFailed(e.to_string())),
            Err(_) => Err(Error::CaptureFailed(format!(
                "timed out after {}ms",
                deadline.as_millis()
            ))),
        }
    }

    /// A page finished loading. A reload tears the probe down, so the
    /// recorded page gets a fresh probe with `START_RECORDING` replayed.
    pub async fn on_page_loaded(&mut self, page: PageHandle) {
        if !self.session.is_recording(page) {
            return;
        }
        info!(%page, "recorded page loaded, reattaching probe");

        if let Err(e) = self.host.inject_probe(page).await {
            warn!(%page, error = %e, "failed to reattach probe");
            return;
        }

        let pending = match self.host.probe(page).await {
            Ok(probe) => probe.send(ProbeCommand::StartRecording),
            Err(e) => Err(e),
        };
        match pending {
            // The probe captures a screenshot through us while starting, so
            // its reply is awaited off the coordinator loop
            Ok(reply) => {
                tokio::spawn(async move {
                    match reply.await {
                        Ok(Some(Err(fault))) => {
                            warn!(%page, error = %fault, "probe refused to resume recording");
                        }
                        Err(_) => warn!(%page, "probe went away before resuming"),
                        Ok(_) => debug!(%page, "probe resumed recording"),
                    }
                });
            }
            Err(e) => warn!(%page, error = %e, "failed to resume recording"),
        }
    }

    /// A page was closed. Closing the recorded page ends the recording and
    /// tells every open controller view.
    pub fn on_page_closed(&mut self, page: PageHandle) {
        if !self.session.is_recording(page) {
            return;
        }
        self.session.stop();
        info!(%page, "recorded page closed");
        self.publish(Notification::RecordingStopped { page });
    }

    /// Best-effort broadcast; closed views are dropped from the registry.
    fn publish(&mut self, notification: Notification) {
        self.listeners.retain(|tx| tx.send(notification).is_ok());
    }
}

fn verify(sender: &MessageSender) -> Result<()> {
    if sender.is_verified() {
        Ok(())
    } else {
        Err(Error::InvalidOrigin)
    }
}

fn into_response(command: &str, result: Result<Reply>) -> Response {
    result.map_err(|e| {
        warn!(command, error = %e, "request failed");
        Fault::from(e)
    })
}
