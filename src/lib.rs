//! stepreel - Record browser interactions as step-by-step tutorials.
//!
//! A coordinator owns the recording session and the persisted steps, a probe
//! in each recorded page groups DOM events into steps, and a controller starts,
//! stops and exports recordings. All three run as tokio tasks that only talk
//! through messages.

pub mod cli;
pub mod config;
pub mod controller;
pub mod coordinator;
pub mod core;
pub mod error;
pub mod export;
pub mod host;
pub mod probe;
pub mod protocol;
pub mod storage;

pub use config::Config;
pub use error::{Error, Result};
