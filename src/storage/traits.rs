//! Storage trait definitions.

use crate::core::Step;
use crate::error::Result;

/// Durable record of the recorded step sequence.
///
/// Every write replaces the whole sequence; a reader never observes a
/// partially written record.
pub trait StepStore: Send + Sync {
    /// Get the persisted steps. A missing record reads as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn get_steps(&self) -> Result<Vec<Step>>;

    /// Replace the persisted steps.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn put_steps(&self, steps: &[Step]) -> Result<()>;

    /// Reset the persisted steps to empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn clear_steps(&self) -> Result<()> {
        self.put_steps(&[])
    }
}
