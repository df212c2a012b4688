//! Success/failure envelopes returned across a context boundary.

use crate::core::Step;
use crate::error::{Error, ErrorKind, Result};
use serde::{Deserialize, Serialize};

/// Successful reply payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Command applied, nothing to return.
    Ack,
    /// A step sequence.
    Steps(Vec<Step>),
    /// A screenshot data URL.
    Screenshot(String),
}

impl Reply {
    /// Take the step sequence out of a reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the reply carries something else.
    pub fn into_steps(self) -> Result<Vec<Step>> {
        match self {
            Self::Steps(steps) => Ok(steps),
            other => Err(Error::InvalidState(format!("expected steps, got {other:?}"))),
        }
    }

    /// Take the screenshot out of a reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the reply carries something else.
    pub fn into_screenshot(self) -> Result<String> {
        match self {
            Self::Screenshot(data_url) => Ok(data_url),
            other => Err(Error::InvalidState(format!(
                "expected screenshot, got {other:?}"
            ))),
        }
    }
}

/// Structured failure: the only form a fault takes once it leaves a handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct Fault {
    /// Classified error kind.
    pub kind: ErrorKind,

    /// Human-readable message.
    pub message: String,
}

impl From<Error> for Fault {
    fn from(err: Error) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Result of one request.
pub type Response = std::result::Result<Reply, Fault>;

/// JSON envelope: `{ "success": bool, "steps"?, "screenshot"?, "error"? }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireResponse {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<Step>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl From<Response> for WireResponse {
    fn from(response: Response) -> Self {
        let mut wire = Self {
            success: response.is_ok(),
            steps: None,
            screenshot: None,
            error: None,
            error_kind: None,
        };
        match response {
            Ok(Reply::Ack) => {}
            Ok(Reply::Steps(steps)) => wire.steps = Some(steps),
            Ok(Reply::Screenshot(data_url)) => wire.screenshot = Some(data_url),
            Err(fault) => {
                wire.error = Some(fault.message);
                wire.error_kind = Some(fault.kind);
            }
        }
        wire
    }
}

impl WireResponse {
    /// Convert back to a typed response.
    #[must_use]
    pub fn into_response(self) -> Response {
        if !self.success {
            return Err(Fault {
                kind: self.error_kind.unwrap_or(ErrorKind::Internal),
                message: self.error.unwrap_or_else(|| "Unknown error".to_string()),
            });
        }
        Ok(match (self.steps, self.screenshot) {
            (Some(steps), _) => Reply::Steps(steps),
            (None, Some(data_url)) => Reply::Screenshot(data_url),
            (None, None) => Reply::Ack,
        })
    }
}
