//! Host environment: pages, probe injection and screen capture.

pub mod local;
pub mod traits;

pub use local::{LocalHost, StaticScreenshot};
pub use traits::{PageHost, ScreenshotCapture};
