//! Message contracts shared by the coordinator, probe and controller.

pub mod command;
pub mod response;

pub use command::{Command, MessageSender, Notification, PageHandle, ProbeCommand};
pub use response::{Fault, Reply, Response, WireResponse};
