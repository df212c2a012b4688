//! Inbound commands and sender identity.

use crate::core::Step;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Opaque identifier of a page (browser tab).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageHandle(pub u64);

impl fmt::Display for PageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page#{}", self.0)
    }
}

/// Identity attached to every message by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSender {
    /// Origin of the sending context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,

    /// URL of the sending context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Page the sender runs in, when it runs inside one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<PageHandle>,
}

impl MessageSender {
    /// Sender for a context running inside `page` at `url`.
    #[must_use]
    pub fn in_page(page: PageHandle, url: &str) -> Self {
        Self {
            origin: None,
            url: Some(url.to_string()),
            page: Some(page),
        }
    }

    /// Sender for an extension view (no page of its own).
    #[must_use]
    pub fn view(origin: &str) -> Self {
        Self {
            origin: Some(origin.to_string()),
            url: None,
            page: None,
        }
    }

    /// A sender must present a non-empty origin or URL.
    #[must_use]
    pub fn is_verified(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        present(&self.origin) || present(&self.url)
    }
}

/// Commands handled by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    /// Mark `page` as the page being recorded.
    StartRecording {
        #[serde(rename = "pageHandle")]
        page: PageHandle,
    },

    /// Clear the recorded page.
    StopRecording,

    /// Replace the persisted steps.
    UpdateSteps { steps: Vec<Step> },

    /// Read the persisted steps.
    GetSteps,

    /// Reset the persisted steps.
    ClearSteps,

    /// Capture the visible area of the sender's page.
    CaptureScreenshot,
}

impl Command {
    /// Wire tags of every command.
    pub const TAGS: [&'static str; 6] = [
        "START_RECORDING",
        "STOP_RECORDING",
        "UPDATE_STEPS",
        "GET_STEPS",
        "CLEAR_STEPS",
        "CAPTURE_SCREENSHOT",
    ];

    /// Decode a raw JSON message.
    ///
    /// # Errors
    ///
    /// Returns `UnknownCommand` for a missing or unrecognized `type` tag and
    /// `InvalidFormat` when a known command carries a malformed body.
    pub fn decode(payload: Value) -> Result<Self> {
        let tag = payload
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if !Self::TAGS.contains(&tag) {
            return Err(Error::UnknownCommand(tag.to_string()));
        }

        if tag == "UPDATE_STEPS" && !payload.get("steps").is_some_and(Value::is_array) {
            return Err(Error::InvalidFormat("steps must be an array".to_string()));
        }

        serde_json::from_value(payload).map_err(|e| Error::InvalidFormat(e.to_string()))
    }

    /// Wire tag of this command.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::StartRecording { .. } => "START_RECORDING",
            Self::StopRecording => "STOP_RECORDING",
            Self::UpdateSteps { .. } => "UPDATE_STEPS",
            Self::GetSteps => "GET_STEPS",
            Self::ClearSteps => "CLEAR_STEPS",
            Self::CaptureScreenshot => "CAPTURE_SCREENSHOT",
        }
    }
}

/// Commands accepted by a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProbeCommand {
    /// Begin recording and open a step immediately.
    StartRecording,

    /// Stop recording and return the final steps.
    StopRecording,

    /// Anything else, including liveness pings. Not answered.
    #[serde(other)]
    Unrecognized,
}

/// Fire-and-forget notifications to controller views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Notification {
    /// The recorded page was closed.
    RecordingStopped {
        #[serde(rename = "pageHandle")]
        page: PageHandle,
    },
}
