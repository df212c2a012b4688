//! File-based storage backend.

use crate::core::Step;
use crate::error::Result;
use crate::storage::traits::StepStore;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the single persisted record.
const RECORD_FILE: &str = "steps.json";

/// File-based storage backend with atomic writes.
#[derive(Debug)]
pub struct FileBackend {
    base_dir: PathBuf,
}

impl FileBackend {
    /// Create a new file backend.
    ///
    /// Creates the base directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(base_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    /// Path of the persisted record.
    #[must_use]
    pub fn record_path(&self) -> PathBuf {
        self.base_dir.join(RECORD_FILE)
    }

    /// Directory holding the record.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

impl StepStore for FileBackend {
    fn get_steps(&self) -> Result<Vec<Step>> {
        let path = self.record_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&path)?;
        let steps: Vec<Step> = serde_json::from_str(&contents)?;
        Ok(steps)
    }

    fn put_steps(&self, steps: &[Step]) -> Result<()> {
        let path = self.record_path();
        let temp = path.with_extension("tmp");

        let contents = serde_json::to_string(steps)?;
        fs::write(&temp, &contents)?;

        // Atomic rename - the record is either the old or the new sequence
        fs::rename(&temp, &path)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EventKind, InteractionEvent, TargetDescriptor};
    use chrono::Utc;
    use tempfile::TempDir;

    fn create_test_backend() -> (FileBackend, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileBackend::new(temp_dir.path().to_path_buf()).unwrap();
        (backend, temp_dir)
    }

    fn sample_step() -> Step {
        let mut step = Step::open(
            "https://shop.test/cart",
            Some("data:image/jpeg;base64,AAAA".to_string()),
            Utc::now(),
        );
        step.events.push(InteractionEvent {
            kind: EventKind::Click,
            target: TargetDescriptor {
                tag_name: "BUTTON".to_string(),
                id: "checkout".to_string(),
                text_content: "Checkout".to_string(),
                ..Default::default()
            },
            occurred_at: Utc::now(),
        });
        step
    }

    #[test]
    fn creates_base_directory() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("b");
        let _backend = FileBackend::new(nested.clone()).unwrap();
        assert!(nested.exists());
    }

    #[test]
    fn missing_record_reads_empty() {
        let (store, _temp) = create_test_backend();
        assert!(store.get_steps().unwrap().is_empty());
    }

    #[test]
    fn put_and_get_steps() {
        let (store, _temp) = create_test_backend();
        let step = sample_step();

        store.put_steps(std::slice::from_ref(&step)).unwrap();

        let steps = store.get_steps().unwrap();
        assert_eq!(steps, vec![step]);
    }

    #[test]
    fn atomic_write_creates_no_temp_file() {
        let (store, temp_dir) = create_test_backend();
        store.put_steps(&[sample_step()]).unwrap();

        assert!(!temp_dir.path().join("steps.tmp").exists());
        assert!(temp_dir.path().join("steps.json").exists());
    }

    #[test]
    fn clear_steps_writes_empty_record() {
        let (store, temp_dir) = create_test_backend();
        store.put_steps(&[sample_step()]).unwrap();
        store.clear_steps().unwrap();

        assert!(store.get_steps().unwrap().is_empty());
        let raw = fs::read_to_string(temp_dir.path().join("steps.json")).unwrap();
        assert_eq!(raw, "[]");
    }

    #[test]
    fn corrupted_record_returns_error() {
        let (store, temp_dir) = create_test_backend();
        fs::write(temp_dir.path().join("steps.json"), "{ invalid }").unwrap();

        assert!(store.get_steps().is_err());
    }

    #[test]
    fn corrupted_record_recovers_after_reset() {
        let (store, temp_dir) = create_test_backend();
        fs::write(temp_dir.path().join("steps.json"), r#"[{"pageUrl": "#).unwrap();

        store.clear_steps().unwrap();
        assert!(store.get_steps().unwrap().is_empty());
    }
}
