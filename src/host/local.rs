//! In-process host: simulated pages with real probe tasks.
//!
//! Each page keeps its URL and at most one live probe. A reload or
//! cross-document navigation kills the probe, exactly like a browser tears
//! down a content script, and then reports the load to the coordinator.

use super::{PageHost, ScreenshotCapture};
use crate::config::Config;
use crate::coordinator::{CoordinatorHandle, PageLink};
use crate::core::ElementSnapshot;
use crate::error::{Error, Result};
use crate::probe::{PageLocation, ProbeHandle, spawn_probe};
use crate::protocol::{PageHandle, ProbeCommand};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::task::JoinHandle;
use tracing::debug;

struct AttachedProbe {
    handle: ProbeHandle,
    task: JoinHandle<()>,
}

impl AttachedProbe {
    fn detach(self) {
        self.task.abort();
    }
}

struct PageState {
    location: PageLocation,
    restricted: bool,
    probe: Option<AttachedProbe>,
}

/// Simulated browser pages driven from the same process.
pub struct LocalHost {
    coordinator: CoordinatorHandle,
    config: Config,
    next_page: AtomicU64,
    pages: Mutex<HashMap<PageHandle, PageState>>,
}

impl LocalHost {
    /// Host reporting page lifecycle to `coordinator`.
    #[must_use]
    pub fn new(coordinator: CoordinatorHandle, config: Config) -> Self {
        Self {
            coordinator,
            config,
            next_page: AtomicU64::new(1),
            pages: Mutex::new(HashMap::new()),
        }
    }

    fn with_pages<T>(&self, f: impl FnOnce(&mut HashMap<PageHandle, PageState>) -> T) -> T {
        let mut pages = self.pages.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut pages)
    }

    fn with_page<T>(&self, page: PageHandle, f: impl FnOnce(&mut PageState) -> T) -> Result<T> {
        self.with_pages(|pages| pages.get_mut(&page).map(f))
            .ok_or(Error::NoActiveTarget)
    }

    /// Open a page at `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the coordinator is gone.
    pub async fn open_page(&self, url: &str) -> Result<PageHandle> {
        self.open(url, false).await
    }

    /// Open a page that refuses probes, like a browser-internal page.
    ///
    /// # Errors
    ///
    /// Returns an error if the coordinator is gone.
    pub async fn open_restricted_page(&self, url: &str) -> Result<PageHandle> {
        self.open(url, true).await
    }

    async fn open(&self, url: &str, restricted: bool) -> Result<PageHandle> {
        let page = PageHandle(self.next_page.fetch_add(1, Ordering::Relaxed));
        self.with_pages(|pages| {
            pages.insert(
                page,
                PageState {
                    location: PageLocation::new(url),
                    restricted,
                    probe: None,
                },
            );
        });
        debug!(%page, url, "page opened");
        self.loaded(page).await?;
        Ok(page)
    }

    /// Cross-document navigation. The probe is destroyed.
    ///
    /// Returns once the coordinator has handled the load.
    ///
    /// # Errors
    ///
    /// Returns `NoActiveTarget` for an unknown page, or an error if the
    /// coordinator is gone.
    pub async fn navigate(&self, page: PageHandle, url: &str) -> Result<()> {
        self.with_page(page, |state| {
            state.location.set(url);
            if let Some(probe) = state.probe.take() {
                probe.detach();
            }
        })?;
        debug!(%page, url, "page navigated");
        self.loaded(page).await
    }

    /// Reload the page. The probe is destroyed.
    ///
    /// # Errors
    ///
    /// Returns `NoActiveTarget` for an unknown page, or an error if the
    /// coordinator is gone.
    pub async fn reload(&self, page: PageHandle) -> Result<()> {
        self.with_page(page, |state| {
            if let Some(probe) = state.probe.take() {
                probe.detach();
            }
        })?;
        debug!(%page, "page reloaded");
        self.loaded(page).await
    }

    /// Same-document navigation (history API). The probe survives.
    ///
    /// # Errors
    ///
    /// Returns `NoActiveTarget` for an unknown page.
    pub fn route_change(&self, page: PageHandle, url: &str) -> Result<()> {
        self.with_page(page, |state| state.location.set(url))
    }

    /// Close the page.
    ///
    /// # Errors
    ///
    /// Returns `NoActiveTarget` for an unknown page, or an error if the
    /// coordinator is gone.
    pub async fn close(&self, page: PageHandle) -> Result<()> {
        let state = self
            .with_pages(|pages| pages.remove(&page))
            .ok_or(Error::NoActiveTarget)?;
        if let Some(probe) = state.probe {
            probe.detach();
        }
        debug!(%page, "page closed");
        self.coordinator.page_closed(page)?;
        self.coordinator.sync().await
    }

    /// Current URL of `page`.
    #[must_use]
    pub fn url(&self, page: PageHandle) -> Option<String> {
        self.with_page(page, |state| state.location.href()).ok()
    }

    /// Fire a DOM event in `page` now.
    ///
    /// Returns whether a probe was there to see it.
    ///
    /// # Errors
    ///
    /// Returns `NoActiveTarget` for an unknown page.
    pub fn dispatch(&self, page: PageHandle, kind: &str, target: ElementSnapshot) -> Result<bool> {
        self.dispatch_at(page, kind, target, Utc::now())
    }

    /// Fire a DOM event in `page` at `at`.
    ///
    /// # Errors
    ///
    /// Returns `NoActiveTarget` for an unknown page.
    pub fn dispatch_at(
        &self,
        page: PageHandle,
        kind: &str,
        target: ElementSnapshot,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let probe = self.with_page(page, |state| {
            state.probe.as_ref().map(|p| p.handle.clone())
        })?;
        match probe {
            // A probe torn down mid-flight just misses the event
            Some(probe) => Ok(probe.dispatch_at(kind, target, at).is_ok()),
            None => Ok(false),
        }
    }

    /// Wait until the page's probe has handled every event fired so far.
    ///
    /// # Errors
    ///
    /// Returns `NoActiveTarget` for an unknown page, or an error if the probe
    /// went away while waiting.
    pub async fn settle(&self, page: PageHandle) -> Result<()> {
        let probe = self.with_page(page, |state| {
            state.probe.as_ref().map(|p| p.handle.clone())
        })?;
        if let Some(probe) = probe {
            // Probes answer nothing to a ping, but only after what came before
            probe.command(ProbeCommand::Unrecognized).await?;
        }
        Ok(())
    }

    async fn loaded(&self, page: PageHandle) -> Result<()> {
        self.coordinator.page_loaded(page)?;
        self.coordinator.sync().await
    }
}

impl Drop for LocalHost {
    fn drop(&mut self) {
        self.with_pages(|pages| {
            for probe in pages.values_mut().filter_map(|state| state.probe.take()) {
                probe.detach();
            }
        });
    }
}

#[async_trait]
impl PageHost for LocalHost {
    async fn check_access(&self, page: PageHandle) -> Result<()> {
        let (restricted, url) =
            self.with_page(page, |state| (state.restricted, state.location.href()))?;
        if restricted {
            return Err(Error::PageUnavailable(format!(
                "{url}. Try another page."
            )));
        }
        Ok(())
    }

    async fn inject_probe(&self, page: PageHandle) -> Result<()> {
        self.check_access(page).await?;
        let link = PageLink::new(self.coordinator.clone(), page);
        self.with_page(page, |state| {
            let (handle, task) = spawn_probe(link, state.location.clone(), &self.config);
            debug!(%page, probe = %handle.id(), "probe injected");
            if let Some(old) = state.probe.replace(AttachedProbe { handle, task }) {
                old.detach();
            }
        })
    }

    async fn probe(&self, page: PageHandle) -> Result<ProbeHandle> {
        self.with_page(page, |state| state.probe.as_ref().map(|p| p.handle.clone()))?
            .ok_or(Error::NoActiveTarget)
    }
}

/// Screen capture that always returns the same image, or always fails.
#[derive(Debug, Clone)]
pub struct StaticScreenshot {
    jpeg: Option<Vec<u8>>,
}

impl StaticScreenshot {
    /// Capture that returns `jpeg`.
    #[must_use]
    pub fn new(jpeg: Vec<u8>) -> Self {
        Self { jpeg: Some(jpeg) }
    }

    /// Capture that returns the JPEG stored at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(Self::new(std::fs::read(path)?))
    }

    /// Capture that always fails.
    #[must_use]
    pub fn unavailable() -> Self {
        Self { jpeg: None }
    }
}

#[async_trait]
impl ScreenshotCapture for StaticScreenshot {
    async fn capture_visible(&self, _page: PageHandle, _quality: u8) -> Result<String> {
        let jpeg = self
            .jpeg
            .as_ref()
            .ok_or_else(|| Error::CaptureFailed("no capture source".to_string()))?;
        Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(jpeg)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::{Coordinator, channel};
    use crate::error::ErrorKind;
    use crate::protocol::{Command, MessageSender, Notification};
    use crate::storage::{MemoryBackend, StepStore};
    use std::sync::Arc;

    struct World {
        host: Arc<LocalHost>,
        coordinator: CoordinatorHandle,
        store: Arc<MemoryBackend>,
    }

    fn world() -> World {
        let config = Config::default();
        let store = Arc::new(MemoryBackend::new());
        let (coordinator, inbox) = channel();
        let host = Arc::new(LocalHost::new(coordinator.clone(), config.clone()));
        Coordinator::new(
            store.clone(),
            host.clone(),
            Arc::new(StaticScreenshot::new(b"\xff\xd8\xff".to_vec())),
            config,
        )
        .spawn(inbox);
        World {
            host,
            coordinator,
            store,
        }
    }

    fn view() -> MessageSender {
        MessageSender::view("chrome-extension://stepreel")
    }

    fn link() -> ElementSnapshot {
        ElementSnapshot {
            tag_name: "A".to_string(),
            text_content: Some("Next".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn static_screenshot_is_data_url() {
        let shot = StaticScreenshot::new(vec![1, 2, 3])
            .capture_visible(PageHandle(1), 80)
            .await
            .unwrap();
        assert_eq!(shot, "data:image/jpeg;base64,AQID");

        let err = StaticScreenshot::unavailable()
            .capture_visible(PageHandle(1), 80)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CaptureFailed);
    }

    #[tokio::test]
    async fn restricted_page_refuses_probe() {
        let w = world();
        let page = w.host.open_restricted_page("chrome://settings").await.unwrap();

        let err = w.host.check_access(page).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoActiveTarget);
        assert!(err.to_string().contains("chrome://settings"));
        assert!(w.host.inject_probe(page).await.is_err());
    }

    #[tokio::test]
    async fn unknown_page_has_no_target() {
        let w = world();
        let err = w.host.probe(PageHandle(99)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoActiveTarget);
    }

    #[tokio::test]
    async fn reload_without_recording_leaves_page_bare() {
        let w = world();
        let page = w.host.open_page("https://a.test/").await.unwrap();
        w.host.inject_probe(page).await.unwrap();
        assert!(w.host.probe(page).await.is_ok());

        w.host.reload(page).await.unwrap();

        assert!(w.host.probe(page).await.is_err());
        assert!(!w.host.dispatch(page, "click", link()).unwrap());
    }

    #[tokio::test]
    async fn reload_of_recorded_page_resumes_with_fresh_probe() {
        let w = world();
        let page = w.host.open_page("https://a.test/").await.unwrap();
        w.host.inject_probe(page).await.unwrap();
        w.coordinator
            .request(view(), Command::StartRecording { page })
            .await
            .unwrap();
        let first = w.host.probe(page).await.unwrap();
        first.start_recording().await.unwrap();

        w.host.reload(page).await.unwrap();

        let second = w.host.probe(page).await.unwrap();
        assert_ne!(first.id(), second.id());
        assert!(w.host.dispatch(page, "click", link()).unwrap());
        let steps = second.stop_recording().await.unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].events.len(), 1);
        assert!(steps[0].screenshot.is_some());
    }

    #[tokio::test]
    async fn route_change_keeps_probe_and_moves_url() {
        let w = world();
        let page = w.host.open_page("https://a.test/").await.unwrap();
        w.host.inject_probe(page).await.unwrap();
        let probe = w.host.probe(page).await.unwrap();
        probe.start_recording().await.unwrap();

        w.host.dispatch(page, "click", link()).unwrap();
        w.host.route_change(page, "https://a.test/next").unwrap();
        w.host.dispatch(page, "click", link()).unwrap();

        let steps = probe.stop_recording().await.unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].page_url, "https://a.test/next");
        assert_eq!(w.host.url(page).as_deref(), Some("https://a.test/next"));
    }

    #[tokio::test]
    async fn forwarded_steps_reach_the_store() {
        let w = world();
        let page = w.host.open_page("https://a.test/").await.unwrap();
        w.host.inject_probe(page).await.unwrap();
        let probe = w.host.probe(page).await.unwrap();
        probe.start_recording().await.unwrap();

        w.host.dispatch(page, "click", link()).unwrap();
        // Stopping waits until the click, and its forward, went through
        probe.stop_recording().await.unwrap();
        w.coordinator.sync().await.unwrap();

        let stored = w.store.get_steps().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].events[0].target.text_content, "Next");
    }

    #[tokio::test]
    async fn closing_recorded_page_stops_recording() {
        let w = world();
        let mut rx = w.coordinator.subscribe().unwrap();
        let page = w.host.open_page("https://a.test/").await.unwrap();
        w.coordinator
            .request(view(), Command::StartRecording { page })
            .await
            .unwrap();

        w.host.close(page).await.unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            Notification::RecordingStopped { page }
        );
        assert!(w.host.url(page).is_none());
    }
}
