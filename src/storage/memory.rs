//! In-memory storage backend.

use crate::core::Step;
use crate::error::Result;
use crate::storage::traits::StepStore;
use std::sync::{PoisonError, RwLock};

/// In-memory storage backend for tests and in-process sessions.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    steps: RwLock<Vec<Step>>,
}

impl MemoryBackend {
    /// Create a new in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend already holding `steps`.
    #[must_use]
    pub fn with_steps(steps: Vec<Step>) -> Self {
        Self {
            steps: RwLock::new(steps),
        }
    }
}

impl StepStore for MemoryBackend {
    fn get_steps(&self) -> Result<Vec<Step>> {
        let steps = self.steps.read().unwrap_or_else(PoisonError::into_inner);
        Ok(steps.clone())
    }

    fn put_steps(&self, steps: &[Step]) -> Result<()> {
        let mut stored = self.steps.write().unwrap_or_else(PoisonError::into_inner);
        *stored = steps.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn step(url: &str) -> Step {
        Step::open(url, None, Utc::now())
    }

    #[test]
    fn get_missing_steps_is_empty() {
        let store = MemoryBackend::new();
        assert!(store.get_steps().unwrap().is_empty());
    }

    #[test]
    fn put_and_get_steps() {
        let store = MemoryBackend::new();
        store.put_steps(&[step("https://a.test/")]).unwrap();

        let steps = store.get_steps().unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].page_url, "https://a.test/");
    }

    #[test]
    fn put_replaces_whole_sequence() {
        let store = MemoryBackend::with_steps(vec![step("https://a.test/"), step("https://b.test/")]);
        store.put_steps(&[step("https://c.test/")]).unwrap();

        let steps = store.get_steps().unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].page_url, "https://c.test/");
    }

    #[test]
    fn clear_steps_empties_store() {
        let store = MemoryBackend::with_steps(vec![step("https://a.test/")]);
        store.clear_steps().unwrap();
        assert!(store.get_steps().unwrap().is_empty());
    }

    #[test]
    fn concurrent_read_write() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(MemoryBackend::new());
        let mut handles = vec![];

        for i in 0..5 {
            let store_clone = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                for j in 0..20 {
                    let steps: Vec<Step> = (0..=(i + j) % 4)
                        .map(|n| step(&format!("https://{n}.test/")))
                        .collect();
                    store_clone.put_steps(&steps).unwrap();
                }
            }));
        }

        for _ in 0..5 {
            let store_clone = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    // Each read sees one whole write, never a mix
                    let steps = store_clone.get_steps().unwrap();
                    for (n, s) in steps.iter().enumerate() {
                        assert_eq!(s.page_url, format!("https://{n}.test/"));
                    }
                }
            }));
        }

        for handle in handles {
            handle.join().expect("Thread panicked");
        }
    }
}
