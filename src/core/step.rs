//! Step and interaction event types.

use crate::config::LimitsConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Interaction kinds observed by the probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Click,
    Input,
    Change,
    Submit,
}

impl EventKind {
    /// Every kind the probe listens for.
    pub const ALL: [Self; 4] = [Self::Click, Self::Input, Self::Change, Self::Submit];

    /// Parse a DOM event type name. Anything else is not recorded.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "click" => Some(Self::Click),
            "input" => Some(Self::Input),
            "change" => Some(Self::Change),
            "submit" => Some(Self::Submit),
            _ => None,
        }
    }

    /// DOM event type name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::Input => "input",
            Self::Change => "change",
            Self::Submit => "submit",
        }
    }
}

/// The element an event fired on, as read from the page before sanitizing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ElementSnapshot {
    pub tag_name: String,
    pub class_name: String,
    pub id: String,
    pub value: Option<String>,
    pub text_content: Option<String>,
}

/// Sanitized, length-bounded description of an event target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TargetDescriptor {
    /// Element tag name.
    pub tag_name: String,

    /// Element class attribute.
    pub class_name: String,

    /// Element id attribute.
    pub id: String,

    /// Current value, only for input-like controls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Trimmed, truncated text content.
    pub text_content: String,
}

impl TargetDescriptor {
    /// Build a descriptor from a raw element, applying the field bounds.
    #[must_use]
    pub fn from_element(element: &ElementSnapshot, limits: &LimitsConfig) -> Self {
        let value = if is_input_like(&element.tag_name) {
            element
                .value
                .as_deref()
                .map(|v| truncate_chars(v, limits.max_field_chars))
        } else {
            None
        };

        Self {
            tag_name: truncate_chars(&element.tag_name, limits.max_field_chars),
            class_name: truncate_chars(&element.class_name, limits.max_field_chars),
            id: truncate_chars(&element.id, limits.max_field_chars),
            value,
            text_content: truncate_chars(
                element.text_content.as_deref().unwrap_or_default().trim(),
                limits.max_text_chars,
            ),
        }
    }

    /// Re-apply the field bounds to a descriptor received over the wire.
    #[must_use]
    pub fn sanitized(&self, limits: &LimitsConfig) -> Self {
        Self {
            tag_name: truncate_chars(&self.tag_name, limits.max_field_chars),
            class_name: truncate_chars(&self.class_name, limits.max_field_chars),
            id: truncate_chars(&self.id, limits.max_field_chars),
            value: if is_input_like(&self.tag_name) {
                self.value
                    .as_deref()
                    .map(|v| truncate_chars(v, limits.max_field_chars))
            } else {
                None
            },
            text_content: truncate_chars(self.text_content.trim(), limits.max_text_chars),
        }
    }
}

/// One recorded interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionEvent {
    /// Event kind.
    pub kind: EventKind,

    /// Sanitized target.
    pub target: TargetDescriptor,

    /// When the event fired.
    pub occurred_at: DateTime<Utc>,
}

/// A time- and URL-bounded group of events with one screenshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// When the step was opened.
    pub created_at: DateTime<Utc>,

    /// URL in effect when the step was opened.
    pub page_url: String,

    /// JPEG data URL, absent if capture failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,

    /// Events in arrival order.
    #[serde(default)]
    pub events: Vec<InteractionEvent>,
}

impl Step {
    /// Open an empty step.
    #[must_use]
    pub fn open(page_url: &str, screenshot: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            page_url: page_url.to_string(),
            screenshot,
            events: Vec::new(),
        }
    }

    /// Whether no event has landed in this step yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Copy of this step with every target re-bounded.
    #[must_use]
    pub fn sanitized(&self, limits: &LimitsConfig) -> Self {
        Self {
            created_at: self.created_at,
            page_url: self.page_url.clone(),
            screenshot: self.screenshot.clone(),
            events: self
                .events
                .iter()
                .map(|e| InteractionEvent {
                    kind: e.kind,
                    target: e.target.sanitized(limits),
                    occurred_at: e.occurred_at,
                })
                .collect(),
        }
    }
}

/// Controls whose current value is worth recording.
fn is_input_like(tag_name: &str) -> bool {
    matches!(
        tag_name.to_ascii_lowercase().as_str(),
        "input" | "textarea" | "select"
    )
}

/// Keep at most `max` characters of `s`.
#[must_use]
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
