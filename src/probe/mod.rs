//! In-page probe: turns raw DOM events into steps.
//!
//! A probe lives exactly as long as one page context. Navigation or reload
//! destroys it; the coordinator injects a fresh one and replays
//! `START_RECORDING` when the page was being recorded.

pub mod handle;

pub use handle::{PageLocation, ProbeHandle, ProbeMessage, spawn_probe};

use crate::config::{LimitsConfig, RecordingConfig};
use crate::core::{ElementSnapshot, EventKind, InteractionEvent, Step, TargetDescriptor};
use crate::error::Result;
use crate::protocol::{ProbeCommand, Reply, Response};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

/// Raw DOM event as observed in the capture phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomEvent {
    /// DOM event type, e.g. `"click"`.
    pub kind: String,

    /// Element the event fired on.
    pub target: ElementSnapshot,

    /// `location.href` when the event fired.
    pub page_url: String,

    /// When the event fired.
    pub at: DateTime<Utc>,
}

/// Messages a probe sends to the coordinator.
#[async_trait]
pub trait CoordinatorLink: Send + Sync {
    /// Ask for a screenshot of the probe's page.
    ///
    /// # Errors
    ///
    /// Returns an error if the capture fails or the coordinator is gone.
    async fn capture_screenshot(&self, page_url: &str) -> Result<String>;

    /// Forward the complete known step sequence.
    ///
    /// # Errors
    ///
    /// Returns an error if the coordinator rejects the update or is gone.
    async fn update_steps(&self, page_url: &str, steps: Vec<Step>) -> Result<()>;
}

/// What an incoming event does to the open step.
enum Boundary {
    /// Append to the open step.
    Keep,
    /// Replace the open step (there is none, or it is still empty).
    Open,
    /// Close the open step and start a new one.
    Advance,
}

/// Step segmentation state for one page context.
pub struct Probe<L> {
    id: Uuid,
    link: L,
    is_recording: bool,
    current_step: Option<Step>,
    steps: Vec<Step>,
    last_event_at: Option<DateTime<Utc>>,
    step_gap: TimeDelta,
    limits: LimitsConfig,
}

impl<L: CoordinatorLink> Probe<L> {
    /// Create an idle probe.
    pub fn new(link: L, recording: &RecordingConfig, limits: LimitsConfig) -> Self {
        let gap_ms = i64::try_from(recording.step_gap_ms).unwrap_or(i64::MAX);
        Self {
            id: Uuid::new_v4(),
            link,
            is_recording: false,
            current_step: None,
            steps: Vec::new(),
            last_event_at: None,
            step_gap: TimeDelta::try_milliseconds(gap_ms).unwrap_or(TimeDelta::MAX),
            limits,
        }
    }

    /// Instance identifier, fresh for every injection.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Whether events are currently being recorded.
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.is_recording
    }

    /// Completed steps followed by the open step, if any.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Step> {
        let mut steps = self.steps.clone();
        steps.extend(self.current_step.iter().cloned());
        steps
    }

    /// Handle a command. Unrecognized messages get no answer.
    pub async fn handle_command(
        &mut self,
        command: ProbeCommand,
        page_url: &str,
        now: DateTime<Utc>,
    ) -> Option<Response> {
        match command {
            ProbeCommand::StartRecording => {
                self.start(page_url, now).await;
                Some(Ok(Reply::Ack))
            }
            ProbeCommand::StopRecording => Some(Ok(Reply::Steps(self.stop()))),
            ProbeCommand::Unrecognized => None,
        }
    }

    /// Begin recording: drop previous steps and open a step right away.
    pub async fn start(&mut self, page_url: &str, now: DateTime<Utc>) {
        self.is_recording = true;
        self.steps.clear();
        self.current_step = Some(self.open_step(page_url, now).await);
        self.last_event_at = Some(now);
        debug!(probe = %self.id, page_url, "recording started");
    }

    /// Stop recording and return the final steps.
    pub fn stop(&mut self) -> Vec<Step> {
        self.is_recording = false;
        if let Some(step) = self.current_step.take() {
            self.steps.push(step);
        }
        debug!(probe = %self.id, steps = self.steps.len(), "recording stopped");
        self.steps.clone()
    }

    /// Segment one DOM event. Returns whether it was recorded.
    pub async fn record(&mut self, event: &DomEvent) -> bool {
        if !self.is_recording {
            return false;
        }
        let Some(kind) = EventKind::parse(&event.kind) else {
            return false;
        };

        let gap_exceeded = self
            .last_event_at
            .is_none_or(|last| event.at - last > self.step_gap);

        let boundary = match &self.current_step {
            None => Boundary::Open,
            // An empty step absorbs the event; it is only re-opened for a new URL
            Some(step) if step.is_empty() => {
                if step.page_url == event.page_url {
                    Boundary::Keep
                } else {
                    Boundary::Open
                }
            }
            Some(step) if gap_exceeded || step.page_url != event.page_url => Boundary::Advance,
            Some(_) => Boundary::Keep,
        };

        match boundary {
            Boundary::Keep => {}
            Boundary::Open => {
                self.current_step = Some(self.open_step(&event.page_url, event.at).await);
            }
            Boundary::Advance => {
                let next = self.open_step(&event.page_url, event.at).await;
                if let Some(done) = self.current_step.replace(next) {
                    self.steps.push(done);
                }
            }
        }

        let recorded = InteractionEvent {
            kind,
            target: TargetDescriptor::from_element(&event.target, &self.limits),
            occurred_at: event.at,
        };
        if let Some(step) = self.current_step.as_mut() {
            step.events.push(recorded);
        }
        self.last_event_at = Some(event.at);

        // Local state stays authoritative when forwarding fails
        if let Err(e) = self.link.update_steps(&event.page_url, self.snapshot()).await {
            warn!(probe = %self.id, error = %e, "failed to forward steps");
        }
        true
    }

    async fn open_step(&self, page_url: &str, now: DateTime<Utc>) -> Step {
        let screenshot = match self.link.capture_screenshot(page_url).await {
            Ok(data_url) => Some(data_url),
            Err(e) => {
                warn!(probe = %self.id, error = %e, "screenshot capture failed");
                None
            }
        };
        Step::open(page_url, screenshot, now)
    }
}
