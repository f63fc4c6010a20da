//! Single task that owns the [`ProxyManager`] and serializes every command.

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::ProxyManager;
use crate::api::messages::{Request, Response};
use crate::error::ManagerError;
use crate::i18n::Language;
use crate::updater::{next_check_delay, UpdateCheckOutcome, UpdateScheduler};

const COMMAND_BUFFER: usize = 64;

enum CheckOrigin {
    User(oneshot::Sender<Response>),
    Scheduled,
}

enum Command {
    Request {
        request: Request,
        reply: oneshot::Sender<Response>,
    },
    ScheduledCheck,
    CheckFinished {
        outcome: UpdateCheckOutcome,
        origin: CheckOrigin,
    },
    Shutdown {
        done: oneshot::Sender<()>,
    },
}

/// Cheap cloneable entry point to a running manager.
#[derive(Clone)]
pub struct ManagerHandle {
    tx: mpsc::Sender<Command>,
}

impl ManagerHandle {
    /// Start the actor. Bootstrapping happens on the actor before the first command.
    pub fn spawn(manager: ProxyManager) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let actor = Actor {
            manager,
            rx,
            tx: tx.downgrade(),
            scheduler: UpdateScheduler::new(),
        };
        let task = tokio::spawn(actor.run());
        (Self { tx }, task)
    }

    pub async fn send(&self, request: Request) -> Result<Response, ManagerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Request { request, reply })
            .await
            .map_err(|_| ManagerError::Closed)?;
        rx.await.map_err(|_| ManagerError::Closed)
    }

    /// Raw JSON in, JSON out. Never fails; errors become `{ success: false, error }`.
    pub async fn dispatch_json(&self, raw: &Value) -> Value {
        let response = match Request::parse(raw) {
            Ok(request) => self
                .send(request)
                .await
                .unwrap_or_else(|err| Response::failure(err.to_string())),
            Err(err) => {
                warn!(%err, "Rejected message");
                Response::failure(err.localized(Language::default()))
            }
        };
        response.to_value()
    }

    pub async fn shutdown(&self) {
        let (done, rx) = oneshot::channel();
        if self.tx.send(Command::Shutdown { done }).await.is_ok() {
            let _ = rx.await;
        }
    }
}

struct Actor {
    manager: ProxyManager,
    rx: mpsc::Receiver<Command>,
    tx: mpsc::WeakSender<Command>,
    scheduler: UpdateScheduler,
}

impl Actor {
    async fn run(mut self) {
        self.manager.bootstrap().await;
        if self.manager.state().update_settings.auto_check {
            self.schedule_from_last_check();
        }

        while let Some(command) = self.rx.recv().await {
            match command {
                Command::Request { request, reply } => self.on_request(request, reply).await,
                Command::ScheduledCheck => {
                    if self.manager.state().update_settings.auto_check {
                        info!("Performing scheduled update check...");
                        self.start_check(CheckOrigin::Scheduled);
                    }
                }
                Command::CheckFinished { outcome, origin } => {
                    self.on_check_finished(outcome, origin).await
                }
                Command::Shutdown { done } => {
                    self.scheduler.cancel();
                    let _ = done.send(());
                    break;
                }
            }
        }
        info!("Proxy manager stopped");
    }

    async fn on_request(&mut self, request: Request, reply: oneshot::Sender<Response>) {
        if let Request::CheckForUpdates = request {
            self.start_check(CheckOrigin::User(reply));
            return;
        }

        let auto_check_before = self.manager.state().update_settings.auto_check;
        let response = self.manager.handle(request).await;
        let auto_check = self.manager.state().update_settings.auto_check;
        if auto_check != auto_check_before {
            if auto_check {
                self.schedule_from_last_check();
            } else {
                debug!("Auto-check disabled; cancelling scheduled check");
                self.scheduler.cancel();
            }
        }

        if reply.send(response).is_err() {
            debug!("Requester went away before the reply");
        }
    }

    /// Run the feed exchange off the actor and post the outcome back.
    fn start_check(&self, origin: CheckOrigin) {
        let checker = self.manager.checker();
        let settings = self.manager.state().update_settings.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = checker.check(&settings).await;
            let Some(tx) = tx.upgrade() else {
                return;
            };
            let _ = tx.send(Command::CheckFinished { outcome, origin }).await;
        });
    }

    async fn on_check_finished(&mut self, outcome: UpdateCheckOutcome, origin: CheckOrigin) {
        let info = self.manager.record_update_check(&outcome).await;
        match origin {
            CheckOrigin::User(reply) => {
                let _ = reply.send(Response::Update { update_info: info });
            }
            CheckOrigin::Scheduled => {
                if let Some(error) = &info.error {
                    info!("Update check failed: {}", error);
                }
                if outcome.is_rate_limited() {
                    warn!("Rate limit hit; not scheduling further checks");
                    return;
                }
                self.manager.announce_update(&info).await;
                let settings = &self.manager.state().update_settings;
                if settings.auto_check {
                    let interval = std::time::Duration::from_millis(settings.check_interval);
                    self.schedule_in(interval);
                }
            }
        }
    }

    fn schedule_from_last_check(&mut self) {
        let settings = &self.manager.state().update_settings;
        let delay = next_check_delay(
            settings.last_check,
            settings.check_interval,
            chrono::Utc::now().timestamp_millis(),
        );
        self.schedule_in(delay);
    }

    fn schedule_in(&mut self, delay: std::time::Duration) {
        let tx = self.tx.clone();
        self.scheduler.schedule(delay, async move {
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(Command::ScheduledCheck).await;
            }
        });
    }
}
