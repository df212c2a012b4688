//! Recording session state owned by the coordinator.

use crate::core::Step;
use crate::error::Result;
use crate::protocol::PageHandle;
use crate::storage::StepStore;
use std::sync::Arc;

/// Which page is being recorded, plus the durable step record.
///
/// Created at process start, reset at suspend. Handlers receive it through
/// the coordinator instead of reaching for a global.
pub struct RecordingSession {
    active_page: Option<PageHandle>,
    store: Arc<dyn StepStore>,
}

impl RecordingSession {
    /// Session over `store` with no active page.
    pub fn new(store: Arc<dyn StepStore>) -> Self {
        Self {
            active_page: None,
            store,
        }
    }

    /// Page currently being recorded.
    #[must_use]
    pub fn active_page(&self) -> Option<PageHandle> {
        self.active_page
    }

    /// Whether `page` is the page being recorded.
    #[must_use]
    pub fn is_recording(&self, page: PageHandle) -> bool {
        self.active_page == Some(page)
    }

    /// Record `page`, replacing any previous one.
    pub fn start(&mut self, page: PageHandle) -> Option<PageHandle> {
        self.active_page.replace(page)
    }

    /// Stop recording, returning the page that was active.
    pub fn stop(&mut self) -> Option<PageHandle> {
        self.active_page.take()
    }

    /// Persisted steps.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn steps(&self) -> Result<Vec<Step>> {
        self.store.get_steps()
    }

    /// Replace the persisted steps.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn replace_steps(&self, steps: &[Step]) -> Result<()> {
        self.store.put_steps(steps)
    }

    /// Empty the persisted steps.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn clear_steps(&self) -> Result<()> {
        self.store.clear_steps()
    }

    /// Reset to the just-installed state.
    ///
    /// The active page is cleared even when the store write fails.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn reset(&mut self) -> Result<()> {
        self.active_page = None;
        self.store.clear_steps()
    }
}
