//! Integration tests for the full recording flow.

use serde_json::json;
use std::sync::Arc;
use stepreel::Config;
use stepreel::controller::{Controller, Status};
use stepreel::coordinator::{Coordinator, CoordinatorHandle, channel};
use stepreel::core::{ElementSnapshot, EventKind, Step};
use stepreel::error::ErrorKind;
use stepreel::host::{LocalHost, StaticScreenshot};
use stepreel::protocol::{Command, MessageSender, Notification, WireResponse};
use stepreel::storage::{FileBackend, StepStore};
use tempfile::TempDir;

struct Extension {
    host: Arc<LocalHost>,
    coordinator: CoordinatorHandle,
    store: Arc<FileBackend>,
    config: Config,
    _dir: TempDir,
}

fn extension() -> Extension {
    let dir = TempDir::new().unwrap();
    let config = Config::default();
    let store = Arc::new(FileBackend::new(dir.path().to_path_buf()).unwrap());
    let (coordinator, inbox) = channel();
    let host = Arc::new(LocalHost::new(coordinator.clone(), config.clone()));
    Coordinator::new(
        store.clone(),
        host.clone(),
        Arc::new(StaticScreenshot::new(vec![0xff, 0xd8, 0xff, 0xd9])),
        config.clone(),
    )
    .spawn(inbox);
    Extension {
        host,
        coordinator,
        store,
        config,
        _dir: dir,
    }
}

impl Extension {
    async fn controller(&self) -> Controller {
        Controller::open(self.coordinator.clone(), self.host.clone(), &self.config)
            .await
            .unwrap()
    }
}

fn view() -> MessageSender {
    MessageSender::view("chrome-extension://stepreel")
}

fn field(id: &str, value: &str) -> ElementSnapshot {
    ElementSnapshot {
        tag_name: "INPUT".to_string(),
        id: id.to_string(),
        value: Some(value.to_string()),
        ..Default::default()
    }
}

fn button(text: &str) -> ElementSnapshot {
    ElementSnapshot {
        tag_name: "BUTTON".to_string(),
        class_name: "btn primary".to_string(),
        text_content: Some(format!("  {text}\n")),
        ..Default::default()
    }
}

#[tokio::test]
async fn full_flow_record_stop_export() {
    let ext = extension();
    let mut controller = ext.controller().await;
    let page = ext.host.open_page("https://shop.test/login").await.unwrap();

    // Step 1: start recording from the controller
    controller.start_recording(page).await.unwrap();
    assert_eq!(controller.status(), &Status::Recording);

    // Step 2: user fills the form and submits
    ext.host.dispatch(page, "input", field("email", "a@b.test")).unwrap();
    ext.host.dispatch(page, "click", button("Sign in")).unwrap();
    ext.host.settle(page).await.unwrap();

    // Forwarded steps are already persisted before the stop
    let persisted = ext.store.get_steps().unwrap();
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].events.len(), 2);

    // Step 3: stop flushes the final sequence
    let steps = controller.stop_recording().await.unwrap().to_vec();
    assert_eq!(steps.len(), 1);
    let events = &steps[0].events;
    assert_eq!(events[0].kind, EventKind::Input);
    assert_eq!(events[0].target.value.as_deref(), Some("a@b.test"));
    assert_eq!(events[1].target.text_content, "Sign in");
    assert!(events[1].target.value.is_none());
    assert!(
        steps[0]
            .screenshot
            .as_deref()
            .is_some_and(|s| s.starts_with("data:image/jpeg;base64,"))
    );
    assert_eq!(ext.store.get_steps().unwrap(), steps);

    // Step 4: export renders every event
    let html = controller.export().unwrap();
    assert!(html.contains("input on input #email"));
    assert!(html.contains("click on button .btn primary : &quot;Sign in&quot;"));
}

#[tokio::test]
async fn fresh_controller_resynchronizes() {
    let ext = extension();
    let mut first = ext.controller().await;
    let page = ext.host.open_page("https://a.test/").await.unwrap();
    first.start_recording(page).await.unwrap();
    ext.host.dispatch(page, "click", button("Go")).unwrap();
    first.stop_recording().await.unwrap();
    drop(first);

    let second = ext.controller().await;
    assert_eq!(second.steps().len(), 1);
    assert_eq!(second.steps()[0].page_url, "https://a.test/");
}

#[tokio::test]
async fn navigation_reattaches_probe_while_recording() {
    let ext = extension();
    let mut controller = ext.controller().await;
    let page = ext.host.open_page("https://a.test/cart").await.unwrap();
    controller.start_recording(page).await.unwrap();

    ext.host.dispatch(page, "click", button("Checkout")).unwrap();
    ext.host.settle(page).await.unwrap();
    ext.host.navigate(page, "https://a.test/checkout").await.unwrap();
    ext.host.dispatch(page, "change", field("zip", "12345")).unwrap();

    let steps = controller.stop_recording().await.unwrap().to_vec();
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].page_url, "https://a.test/checkout");
    assert_eq!(steps[0].events[0].kind, EventKind::Change);
}

#[tokio::test]
async fn same_document_navigation_splits_steps() {
    let ext = extension();
    let mut controller = ext.controller().await;
    let page = ext.host.open_page("https://spa.test/#/a").await.unwrap();
    controller.start_recording(page).await.unwrap();

    ext.host.dispatch(page, "click", button("Next")).unwrap();
    ext.host.route_change(page, "https://spa.test/#/b").unwrap();
    ext.host.dispatch(page, "click", button("Done")).unwrap();

    let steps = controller.stop_recording().await.unwrap().to_vec();
    let urls: Vec<_> = steps.iter().map(|s| s.page_url.as_str()).collect();
    assert_eq!(urls, vec!["https://spa.test/#/a", "https://spa.test/#/b"]);
}

#[tokio::test]
async fn closing_recorded_tab_notifies_every_view() {
    let ext = extension();
    let mut controller = ext.controller().await;
    let mut other_view = ext.coordinator.subscribe().unwrap();
    let page = ext.host.open_page("https://a.test/").await.unwrap();
    controller.start_recording(page).await.unwrap();

    ext.host.close(page).await.unwrap();

    assert_eq!(
        controller.poll_notifications(),
        vec![Notification::RecordingStopped { page }]
    );
    assert_eq!(
        other_view.try_recv().unwrap(),
        Notification::RecordingStopped { page }
    );
    assert!(controller.recording_page().is_none());

    // The session no longer has a page to capture
    let err = ext
        .coordinator
        .request(view(), Command::CaptureScreenshot)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoActiveTarget);
}

#[tokio::test]
async fn rejected_updates_leave_state_unchanged() {
    let ext = extension();
    let prior = vec![Step::open("https://a.test/", None, chrono::Utc::now())];
    ext.coordinator
        .request(view(), Command::UpdateSteps { steps: prior.clone() })
        .await
        .unwrap();

    let mut huge = Step::open("https://a.test/", None, chrono::Utc::now());
    huge.screenshot = Some("x".repeat(6 * 1024 * 1024));
    let err = ext
        .coordinator
        .request(view(), Command::UpdateSteps { steps: vec![huge] })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TooLarge);

    let err = ext
        .coordinator
        .request_raw(view(), json!({ "type": "UPDATE_STEPS", "steps": "all of them" }))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidFormat);

    let err = ext
        .coordinator
        .request(MessageSender::default(), Command::ClearSteps)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOrigin);

    assert_eq!(ext.store.get_steps().unwrap(), prior);
}

#[tokio::test]
async fn get_steps_is_idempotent_and_clear_empties() {
    let ext = extension();
    let steps = vec![Step::open("https://a.test/", None, chrono::Utc::now())];
    ext.coordinator
        .request(view(), Command::UpdateSteps { steps })
        .await
        .unwrap();

    let first = ext.coordinator.request(view(), Command::GetSteps).await.unwrap();
    let second = ext.coordinator.request(view(), Command::GetSteps).await.unwrap();
    assert_eq!(first, second);

    ext.coordinator.request(view(), Command::ClearSteps).await.unwrap();
    let after = ext
        .coordinator
        .request(view(), Command::GetSteps)
        .await
        .unwrap()
        .into_steps()
        .unwrap();
    assert!(after.is_empty());
}

#[tokio::test]
async fn wire_envelope_reports_failure() {
    let ext = extension();
    let response = ext
        .coordinator
        .request_raw(view(), json!({ "type": "TEST_FEATURES" }))
        .await
        .map_err(stepreel::protocol::Fault::from);
    let wire = WireResponse::from(response);

    assert!(!wire.success);
    assert!(wire.error.unwrap().contains("TEST_FEATURES"));
}

#[tokio::test]
async fn suspend_wipes_persisted_steps() {
    let ext = extension();
    ext.coordinator
        .request(
            view(),
            Command::UpdateSteps {
                steps: vec![Step::open("https://a.test/", None, chrono::Utc::now())],
            },
        )
        .await
        .unwrap();

    ext.coordinator.suspend().await.unwrap();

    assert!(ext.store.get_steps().unwrap().is_empty());
}
