//! Capabilities the host environment provides to the coordinator and controller.

use crate::error::Result;
use crate::probe::ProbeHandle;
use crate::protocol::PageHandle;
use async_trait::async_trait;

/// Pixel capture of a page's visible area.
#[async_trait]
pub trait ScreenshotCapture: Send + Sync {
    /// Capture `page` as a JPEG data URL at `quality` (0-100).
    ///
    /// # Errors
    ///
    /// Returns an error if the page cannot be captured.
    async fn capture_visible(&self, page: PageHandle, quality: u8) -> Result<String>;
}

/// Attaching probes to pages and reaching them.
#[async_trait]
pub trait PageHost: Send + Sync {
    /// Check that a probe may run in `page`.
    ///
    /// # Errors
    ///
    /// Returns an error if the page is unknown or does not allow scripts.
    async fn check_access(&self, page: PageHandle) -> Result<()>;

    /// Attach a fresh probe to `page`.
    ///
    /// # Errors
    ///
    /// Returns an error if the page is unknown or does not allow scripts.
    async fn inject_probe(&self, page: PageHandle) -> Result<()>;

    /// Channel to the probe currently living in `page`.
    ///
    /// # Errors
    ///
    /// Returns `NoActiveTarget` if no probe is attached.
    async fn probe(&self, page: PageHandle) -> Result<ProbeHandle>;
}
