//! Error types for stepreel.

use crate::protocol::Fault;
use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Result type alias for stepreel operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in stepreel operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage I/O error.
    #[error("Storage error: {0}")]
    Storage(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Message arrived from a sender with neither origin nor URL.
    #[error("Invalid message origin")]
    InvalidOrigin,

    /// Malformed message payload.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Serialized payload exceeds the persistence cap.
    #[error("Steps data too large: {size} bytes (limit {limit})")]
    TooLarge {
        /// Serialized size in bytes.
        size: usize,
        /// Configured cap in bytes.
        limit: usize,
    },

    /// Screenshot capability failed.
    #[error("Screenshot capture failed: {0}")]
    CaptureFailed(String),

    /// Command tag not recognized.
    #[error("Unknown message type: {0}")]
    UnknownCommand(String),

    /// No page could be resolved for the request.
    #[error("No active tab found")]
    NoActiveTarget,

    /// The page exists but does not accept a probe.
    #[error("Cannot access page: {0}")]
    PageUnavailable(String),

    /// The other side of a message channel is gone.
    #[error("Channel closed: {0}")]
    ChannelClosed(&'static str),

    /// Invalid state encountered.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request rejected by another context.
    #[error("{0}")]
    Remote(#[from] Fault),
}

/// Error kind carried across a context boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidOrigin,
    InvalidFormat,
    TooLarge,
    CaptureFailed,
    UnknownCommand,
    NoActiveTarget,
    /// Storage, channel and other local faults.
    Internal,
}

impl Error {
    /// Classify this error for a failure envelope.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidOrigin => ErrorKind::InvalidOrigin,
            Self::InvalidFormat(_) | Self::Serde(_) => ErrorKind::InvalidFormat,
            Self::TooLarge { .. } => ErrorKind::TooLarge,
            Self::CaptureFailed(_) => ErrorKind::CaptureFailed,
            Self::UnknownCommand(_) => ErrorKind::UnknownCommand,
            Self::NoActiveTarget | Self::PageUnavailable(_) => ErrorKind::NoActiveTarget,
            Self::Remote(fault) => fault.kind,
            Self::Storage(_) | Self::ChannelClosed(_) | Self::InvalidState(_) | Self::Config(_) => {
                ErrorKind::Internal
            }
        }
    }
}
