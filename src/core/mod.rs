//! Core recording types.

pub mod step;

pub use step::{ElementSnapshot, EventKind, InteractionEvent, Step, TargetDescriptor, truncate_chars};
