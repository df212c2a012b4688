//! Coordinator task and its client handle.

use super::Coordinator;
use crate::core::Step;
use crate::error::{Error, Result};
use crate::probe::CoordinatorLink;
use crate::protocol::{Command, MessageSender, Notification, PageHandle, Reply, Response};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Messages delivered to the coordinator task, handled strictly in order.
#[derive(Debug)]
pub enum Inbound {
    /// A typed command.
    Request {
        sender: MessageSender,
        command: Command,
        reply: oneshot::Sender<Response>,
    },

    /// An undecoded JSON command.
    RawRequest {
        sender: MessageSender,
        payload: Value,
        reply: oneshot::Sender<Response>,
    },

    /// A page finished loading.
    PageLoaded(PageHandle),

    /// A page was closed.
    PageClosed(PageHandle),

    /// A controller view wants notifications.
    Subscribe(mpsc::UnboundedSender<Notification>),

    /// First install.
    Install(oneshot::Sender<Response>),

    /// The process is being suspended. The task ends after cleanup.
    Suspend(oneshot::Sender<()>),

    /// Barrier: answered once every earlier message has been handled.
    Sync(oneshot::Sender<()>),
}

/// Receiving side of the coordinator channel.
pub struct CoordinatorInbox(mpsc::UnboundedReceiver<Inbound>);

/// Create a coordinator channel.
///
/// The handle exists before the coordinator itself so hosts that call back
/// into the coordinator can be built first.
#[must_use]
pub fn channel() -> (CoordinatorHandle, CoordinatorInbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (CoordinatorHandle { tx }, CoordinatorInbox(rx))
}

impl Coordinator {
    /// Run the coordinator on its own task.
    pub fn spawn(self, inbox: CoordinatorInbox) -> JoinHandle<()> {
        tokio::spawn(self.run(inbox))
    }

    /// Handle messages until the process suspends or every handle is dropped.
    ///
    /// A host that holds its own handle, like [`LocalHost`](crate::host::LocalHost),
    /// keeps the inbox open, so with such a host the loop only ends on suspend
    /// or when the task is aborted.
    pub async fn run(mut self, inbox: CoordinatorInbox) {
        let CoordinatorInbox(mut rx) = inbox;
        while let Some(message) = rx.recv().await {
            match message {
                Inbound::Request {
                    sender,
                    command,
                    reply,
                } => {
                    let response = self.handle(&sender, command).await;
                    // The caller may have stopped waiting
                    let _ = reply.send(response);
                }
                Inbound::RawRequest {
                    sender,
                    payload,
                    reply,
                } => {
                    let response = self.handle_raw(&sender, payload).await;
                    let _ = reply.send(response);
                }
                Inbound::PageLoaded(page) => self.on_page_loaded(page).await,
                Inbound::PageClosed(page) => self.on_page_closed(page),
                Inbound::Subscribe(listener) => {
                    debug!("controller view subscribed");
                    self.listeners.retain(|l| !l.is_closed());
                    self.listeners.push(listener);
                }
                Inbound::Install(reply) => {
                    let response = self.install().map(|()| Reply::Ack).map_err(Into::into);
                    let _ = reply.send(response);
                }
                Inbound::Suspend(reply) => {
                    self.suspend();
                    let _ = reply.send(());
                    info!("coordinator suspended");
                    return;
                }
                Inbound::Sync(reply) => {
                    let _ = reply.send(());
                }
            }
        }
        debug!("coordinator stopped");
    }
}

/// Client side of a running coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::UnboundedSender<Inbound>,
}

impl CoordinatorHandle {
    fn post(&self, message: Inbound) -> Result<()> {
        self.tx
            .send(message)
            .map_err(|_| Error::ChannelClosed("coordinator"))
    }

    async fn ask<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Inbound) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.post(make(reply))?;
        rx.await.map_err(|_| Error::ChannelClosed("coordinator"))
    }

    /// Send a command and wait for the reply.
    ///
    /// # Errors
    ///
    /// Returns the handler's fault, or an error if the coordinator is gone.
    pub async fn request(&self, sender: MessageSender, command: Command) -> Result<Reply> {
        let response = self
            .ask(|reply| Inbound::Request {
                sender,
                command,
                reply,
            })
            .await?;
        Ok(response?)
    }

    /// Send a raw JSON command and wait for the reply.
    ///
    /// # Errors
    ///
    /// Returns the handler's fault, or an error if the coordinator is gone.
    pub async fn request_raw(&self, sender: MessageSender, payload: Value) -> Result<Reply> {
        let response = self
            .ask(|reply| Inbound::RawRequest {
                sender,
                payload,
                reply,
            })
            .await?;
        Ok(response?)
    }

    /// Report that `page` finished loading.
    ///
    /// # Errors
    ///
    /// Returns an error if the coordinator is gone.
    pub fn page_loaded(&self, page: PageHandle) -> Result<()> {
        self.post(Inbound::PageLoaded(page))
    }

    /// Report that `page` was closed.
    ///
    /// # Errors
    ///
    /// Returns an error if the coordinator is gone.
    pub fn page_closed(&self, page: PageHandle) -> Result<()> {
        self.post(Inbound::PageClosed(page))
    }

    /// Register for notifications.
    ///
    /// # Errors
    ///
    /// Returns an error if the coordinator is gone.
    pub fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<Notification>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.post(Inbound::Subscribe(tx))?;
        Ok(rx)
    }

    /// First-install initialization.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reset or the coordinator is gone.
    pub async fn install(&self) -> Result<()> {
        self.ask(Inbound::Install).await??;
        Ok(())
    }

    /// Suspend the coordinator. It stops handling messages afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the coordinator is already gone.
    pub async fn suspend(&self) -> Result<()> {
        self.ask(Inbound::Suspend).await
    }

    /// Wait until every message sent so far has been handled.
    ///
    /// # Errors
    ///
    /// Returns an error if the coordinator is gone.
    pub async fn sync(&self) -> Result<()> {
        self.ask(Inbound::Sync).await
    }
}

/// A probe's link to the coordinator, speaking for one page.
#[derive(Debug, Clone)]
pub struct PageLink {
    coordinator: CoordinatorHandle,
    page: PageHandle,
}

impl PageLink {
    /// Link for the probe living in `page`.
    #[must_use]
    pub fn new(coordinator: CoordinatorHandle, page: PageHandle) -> Self {
        Self { coordinator, page }
    }
}

#[async_trait]
impl CoordinatorLink for PageLink {
    async fn capture_screenshot(&self, page_url: &str) -> Result<String> {
        self.coordinator
            .request(
                MessageSender::in_page(self.page, page_url),
                Command::CaptureScreenshot,
            )
            .await?
            .into_screenshot()
    }

    async fn update_steps(&self, page_url: &str, steps: Vec<Step>) -> Result<()> {
        self.coordinator
            .request(
                MessageSender::in_page(self.page, page_url),
                Command::UpdateSteps { steps },
            )
            .await?;
        Ok(())
    }
}
