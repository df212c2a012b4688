//! Probe task and its client handle.

use super::{CoordinatorLink, DomEvent, Probe};
use crate::config::Config;
use crate::core::{ElementSnapshot, Step};
use crate::error::{Error, Result};
use crate::protocol::{ProbeCommand, Reply, Response};
use chrono::{DateTime, Utc};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

/// The page's current URL, shared between the page and its probe.
#[derive(Debug, Clone, Default)]
pub struct PageLocation(Arc<RwLock<String>>);

impl PageLocation {
    /// Location starting at `url`.
    #[must_use]
    pub fn new(url: &str) -> Self {
        Self(Arc::new(RwLock::new(url.to_string())))
    }

    /// Current URL.
    #[must_use]
    pub fn href(&self) -> String {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Change the URL in place (same-document navigation).
    pub fn set(&self, url: &str) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = url.to_string();
    }
}

/// Messages delivered to a probe task, handled strictly in order.
#[derive(Debug)]
pub enum ProbeMessage {
    /// A command expecting at most one reply.
    Command {
        command: ProbeCommand,
        reply: oneshot::Sender<Option<Response>>,
    },

    /// A DOM event from the capture-phase listeners.
    Dom(DomEvent),
}

/// Client side of a running probe.
#[derive(Debug, Clone)]
pub struct ProbeHandle {
    id: Uuid,
    tx: mpsc::UnboundedSender<ProbeMessage>,
    location: PageLocation,
}

impl ProbeHandle {
    /// Instance identifier of the probe behind this handle.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Whether the probe task has gone away.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Enqueue a command and return the pending reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the probe is gone.
    pub fn send(&self, command: ProbeCommand) -> Result<oneshot::Receiver<Option<Response>>> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ProbeMessage::Command { command, reply })
            .map_err(|_| Error::ChannelClosed("probe"))?;
        Ok(rx)
    }

    /// Send a command and wait for the reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the probe is gone or answers with a failure.
    pub async fn command(&self, command: ProbeCommand) -> Result<Option<Reply>> {
        let rx = self.send(command)?;
        let response = rx.await.map_err(|_| Error::ChannelClosed("probe"))?;
        Ok(response.transpose()?)
    }

    /// Begin recording.
    ///
    /// # Errors
    ///
    /// Returns an error if the probe is gone or refuses.
    pub async fn start_recording(&self) -> Result<()> {
        self.command(ProbeCommand::StartRecording).await?;
        Ok(())
    }

    /// Stop recording and collect the final steps.
    ///
    /// # Errors
    ///
    /// Returns an error if the probe is gone or did not answer with steps.
    pub async fn stop_recording(&self) -> Result<Vec<Step>> {
        self.command(ProbeCommand::StopRecording)
            .await?
            .ok_or_else(|| Error::InvalidState("probe did not answer".to_string()))?
            .into_steps()
    }

    /// Deliver a DOM event. Fire-and-forget.
    ///
    /// # Errors
    ///
    /// Returns an error if the probe is gone.
    pub fn dispatch(&self, kind: &str, target: ElementSnapshot) -> Result<()> {
        self.dispatch_at(kind, target, Utc::now())
    }

    /// Deliver a DOM event that fired at `at`.
    ///
    /// # Errors
    ///
    /// Returns an error if the probe is gone.
    pub fn dispatch_at(
        &self,
        kind: &str,
        target: ElementSnapshot,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let event = DomEvent {
            kind: kind.to_string(),
            target,
            page_url: self.location.href(),
            at,
        };
        self.tx
            .send(ProbeMessage::Dom(event))
            .map_err(|_| Error::ChannelClosed("probe"))
    }
}

/// Spawn a probe task for a page.
///
/// The task ends when every handle is dropped or the task is aborted.
pub fn spawn_probe<L>(
    link: L,
    location: PageLocation,
    config: &Config,
) -> (ProbeHandle, JoinHandle<()>)
where
    L: CoordinatorLink + 'static,
{
    let mut probe = Probe::new(link, &config.recording, config.limits);
    let id = probe.id();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let page_location = location.clone();

    let task = tokio::spawn(async move {
        debug!(probe = %id, "probe attached");
        while let Some(message) = rx.recv().await {
            match message {
                ProbeMessage::Command { command, reply } => {
                    let response = probe
                        .handle_command(command, &page_location.href(), Utc::now())
                        .await;
                    // The caller may have stopped waiting
                    let _ = reply.send(response);
                }
                ProbeMessage::Dom(event) => {
                    probe.record(&event).await;
                }
            }
        }
        debug!(probe = %id, "probe detached");
    });

    (ProbeHandle { id, tx, location }, task)
}
