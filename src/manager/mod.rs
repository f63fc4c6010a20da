//! The stateful core: owns the extension state and executes commands.
//!
//! A `ProxyManager` is driven by exactly one task (see [`actor`]), so its methods
//! take `&mut self` and nothing in here locks.

pub mod actor;

pub use actor::ManagerHandle;

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::api::messages::{Request, Response};
use crate::error::ManagerError;
use crate::i18n::{self, Language, Message};
use crate::migration;
use crate::models::{
    ExtensionState, PendingUpdate, ProxyServer, ServerInput, ServerProfile, UpdateInfo,
};
use crate::net::HttpClient;
use crate::notify::{ManagerEvent, Notifier};
use crate::platform::PlatformProxyAdapter;
use crate::proxy::{Diagnostics, ProxyApplier};
use crate::storage::{SaveOutcome, StateStore};
use crate::updater::{UpdateCheckOutcome, UpdateChecker};

pub type ManagerResult<T> = Result<T, ManagerError>;

pub struct ProxyManager {
    state: ExtensionState,
    language: Language,
    version: String,
    store: StateStore,
    applier: ProxyApplier,
    diagnostics: Diagnostics,
    checker: UpdateChecker,
    notifier: Arc<dyn Notifier>,
}

impl ProxyManager {
    pub fn new(
        store: StateStore,
        adapter: Arc<dyn PlatformProxyAdapter>,
        http: Arc<dyn HttpClient>,
        notifier: Arc<dyn Notifier>,
        version: impl Into<String>,
    ) -> Self {
        let version = version.into();
        let applier = ProxyApplier::new(adapter);
        Self {
            state: ExtensionState::default(),
            language: Language::default(),
            diagnostics: Diagnostics::new(applier.clone(), Arc::clone(&http)),
            checker: UpdateChecker::new(http, version.clone()),
            version,
            store,
            applier,
            notifier,
        }
    }

    /// Language used until the user picks one.
    pub fn with_default_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn state(&self) -> &ExtensionState {
        &self.state
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn checker(&self) -> UpdateChecker {
        self.checker.clone()
    }

    /// Load state and language, run pending migrations, announce status.
    pub async fn bootstrap(&mut self) {
        self.state = self.store.load().await;

        match self.store.load_language().await {
            Ok(Some(language)) => self.language = language,
            Ok(None) => {}
            Err(err) => warn!(?err, "Failed to load language preference"),
        }

        let last = self.state.last_extension_version.clone();
        if last.as_deref() != Some(self.version.as_str()) {
            info!(
                "Extension updated from {} to {}",
                last.as_deref().unwrap_or("new install"),
                self.version
            );
            migration::run_migrations(&mut self.state, last.as_deref(), &self.version);
            self.state.last_extension_version = Some(self.version.clone());
            self.persist().await;
        }

        self.emit_status();
        info!(
            servers = self.state.servers.len(),
            enabled = self.state.enabled,
            "Proxy manager initialized"
        );
    }

    /// Execute one request. Failures become `{ success: false, error }`.
    pub async fn handle(&mut self, request: Request) -> Response {
        let action = request.action();
        debug!(action, "Handling message");
        match self.dispatch(request).await {
            Ok(response) => response,
            Err(err) => {
                error!(action, %err, "Error handling message");
                Response::failure(err.localized(self.language))
            }
        }
    }

    async fn dispatch(&mut self, request: Request) -> ManagerResult<Response> {
        let response = match request {
            Request::GetState => Response::State(self.state.popup_view()),
            Request::ToggleProxy { enabled } => {
                self.toggle_proxy(enabled).await?;
                Response::ok()
            }
            Request::ToggleDnsProxy { enabled } => {
                self.toggle_dns_proxy(enabled).await?;
                Response::ok()
            }
            Request::SelectServer { server_id } => {
                self.select_server(&server_id).await?;
                Response::ok()
            }
            Request::AddServer { server_data } => {
                self.add_server(&server_data).await?;
                Response::ok()
            }
            Request::UpdateServer {
                server_id,
                server_data,
            } => {
                self.update_server(&server_id, &server_data).await?;
                Response::ok()
            }
            Request::DeleteServer { server_id } => {
                self.delete_server(&server_id).await?;
                Response::ok()
            }
            Request::GetServer { server_id } => Response::Server {
                server: self.state.server(&server_id).cloned(),
            },
            Request::GetServerDetails { server_id } => {
                let server = self
                    .state
                    .server(&server_id)
                    .cloned()
                    .ok_or(ManagerError::NotFound(server_id))?;
                Response::ServerDetails {
                    success: true,
                    server,
                }
            }
            Request::TestProxyServer { server } => Response::ProbeResult {
                success: true,
                result: self.test_proxy_server(&server).await?,
            },
            Request::CheckForUpdates => {
                // Normally intercepted by the actor; running inline blocks until done.
                let outcome = self.checker.check(&self.state.update_settings).await;
                Response::Update {
                    update_info: self.record_update_check(&outcome).await,
                }
            }
            Request::ToggleAutoUpdate { enabled } => {
                self.toggle_auto_update(enabled).await;
                Response::ok()
            }
            Request::GetUpdateSettings => Response::UpdateSettings {
                update_settings: self.state.update_settings.clone(),
                current_version: self.version.clone(),
            },
            Request::GetProxyDiagnostics => Response::Diagnostics {
                diagnostics: self.proxy_diagnostics().await?,
            },
            Request::ForceApplyProxy => match self.force_apply_proxy().await {
                Ok(()) => Response::Message {
                    success: true,
                    message: i18n::text(self.language, Message::ProxyReapplied).to_string(),
                },
                Err(ManagerError::NoActiveServer) => Response::Message {
                    success: false,
                    message: ManagerError::NoActiveServer.localized(self.language),
                },
                Err(err) => return Err(err),
            },
            Request::GetLanguage => Response::Language {
                language: self.language,
            },
            Request::SetLanguage { language } => {
                self.set_language(Language::from_code(&language)).await;
                Response::Language {
                    language: self.language,
                }
            }
            Request::RestoreBackup => Response::Ack {
                success: self.restore_backup().await,
            },
        };
        Ok(response)
    }

    pub async fn toggle_proxy(&mut self, enabled: bool) -> ManagerResult<()> {
        info!("Toggling proxy: {}", enabled);
        match self.applier.has_permission().await {
            Ok(true) => {}
            Ok(false) => warn!("{}", ManagerError::PermissionMissing),
            Err(err) => warn!(?err, "Permission check failed"),
        }

        if !enabled {
            self.state.enabled = false;
            let cleared = self.applier.clear().await;
            self.persist().await;
            self.emit_status();
            return cleared.map_err(ManagerError::Host);
        }

        let profile = match self.state.active_server().cloned() {
            Some(profile) => profile,
            None => {
                let Some(first) = self.state.servers.first().cloned() else {
                    self.state.enabled = false;
                    return Err(ManagerError::NoServers);
                };
                info!("No active server, selecting first available: {}", first.name);
                self.state.active_server_id = Some(first.id.clone());
                first
            }
        };

        self.state.enabled = true;
        let applied = self.applier.apply(&profile, self.state.dns_enabled).await;
        if applied.is_err() {
            self.state.enabled = false;
        }
        self.persist().await;
        self.emit_status();
        applied.map_err(ManagerError::Host)?;
        info!("Proxy toggle completed. Enabled: {}", self.state.enabled);
        Ok(())
    }

    /// Store the DNS preference and reapply the active profile so it takes effect.
    pub async fn toggle_dns_proxy(&mut self, enabled: bool) -> ManagerResult<()> {
        info!("DNS through proxy setting changed to: {}", enabled);
        self.state.dns_enabled = enabled;
        self.persist().await;
        self.reapply_if_enabled().await
    }

    pub async fn select_server(&mut self, id: &str) -> ManagerResult<()> {
        if self.state.server(id).is_none() {
            return Err(ManagerError::NotFound(id.to_string()));
        }
        self.state.active_server_id = Some(id.to_string());
        let applied = self.reapply_if_enabled().await;
        self.persist().await;
        applied
    }

    pub async fn add_server(&mut self, input: &ServerInput) -> ManagerResult<ServerProfile> {
        let profile = ServerProfile::from_input(input.validate()?);
        info!(server = %profile.name, "Adding server");
        self.state.servers.push(profile.clone());

        if self.state.servers.len() == 1 && self.state.active_server_id.is_none() {
            self.state.active_server_id = Some(profile.id.clone());
        }
        self.persist().await;
        Ok(profile)
    }

    pub async fn update_server(&mut self, id: &str, input: &ServerInput) -> ManagerResult<()> {
        let index = self
            .state
            .server_index(id)
            .ok_or_else(|| ManagerError::NotFound(id.to_string()))?;
        let valid = input.validate()?;
        self.state.servers[index].apply_input(valid);

        let is_active = self.state.active_server_id.as_deref() == Some(id);
        let applied = if is_active {
            self.reapply_if_enabled().await
        } else {
            Ok(())
        };
        self.persist().await;
        applied
    }

    pub async fn delete_server(&mut self, id: &str) -> ManagerResult<()> {
        let index = self
            .state
            .server_index(id)
            .ok_or_else(|| ManagerError::NotFound(id.to_string()))?;
        let removed = self.state.servers.remove(index);
        info!(server = %removed.name, "Deleted server");

        if self.state.active_server_id.as_deref() == Some(id) {
            self.state.active_server_id = None;
            self.state.enabled = false;
            if let Err(err) = self.applier.clear().await {
                warn!(?err, "Failed to clear proxy settings after deleting active server");
            }
        }

        self.persist().await;
        self.emit_status();
        Ok(())
    }

    /// Validate the candidate and probe it once.
    pub async fn test_proxy_server(
        &mut self,
        input: &ServerInput,
    ) -> ManagerResult<crate::models::DiagnosticReport> {
        let candidate = input.validate()?;
        let target = ProxyServer {
            scheme: candidate.server_type.scheme(),
            host: candidate.host,
            port: candidate.port,
        };
        Ok(self.diagnostics.probe(&target, self.language).await)
    }

    pub async fn toggle_auto_update(&mut self, enabled: bool) {
        self.state.update_settings.auto_check = enabled;
        self.persist().await;
    }

    /// Host settings currently in effect, PAC bodies redacted.
    pub async fn proxy_diagnostics(
        &self,
    ) -> ManagerResult<Option<crate::models::ProxySettings>> {
        let current = self.applier.current().await.map_err(ManagerError::Host)?;
        Ok(current.map(|settings| settings.redacted()))
    }

    pub async fn force_apply_proxy(&mut self) -> ManagerResult<()> {
        if !self.state.enabled {
            return Err(ManagerError::NoActiveServer);
        }
        let profile = self
            .state
            .active_server()
            .cloned()
            .ok_or(ManagerError::NoActiveServer)?;
        self.applier
            .apply(&profile, self.state.dns_enabled)
            .await
            .map_err(ManagerError::Host)
    }

    pub async fn set_language(&mut self, language: Language) {
        self.language = language;
        if let Err(err) = self.store.save_language(language).await {
            warn!(?err, "Failed to save language preference");
        }
        self.emit_status();
    }

    /// Replace in-memory state with the backup copy. Returns false when none exists.
    pub async fn restore_backup(&mut self) -> bool {
        match self.store.restore_from_backup().await {
            Ok(Some(state)) => {
                self.state = state;
                self.persist().await;
                if let Err(err) = self.reapply_if_enabled().await {
                    warn!(%err, "Failed to apply restored proxy settings");
                }
                self.emit_status();
                true
            }
            Ok(None) => false,
            Err(err) => {
                error!(?err, "Error restoring from backup");
                false
            }
        }
    }

    /// Fold a finished check into state and produce the UI result.
    pub async fn record_update_check(&mut self, outcome: &UpdateCheckOutcome) -> UpdateInfo {
        let settings = &mut self.state.update_settings;
        match &outcome.result {
            Ok(_) => {
                settings.last_check = Some(chrono::Utc::now().timestamp_millis());
                settings.current_retries = 0;
            }
            Err(_) => settings.current_retries = outcome.retries,
        }
        let max_retries = settings.max_retries;
        self.persist().await;
        outcome.to_info(&self.version, max_retries, self.language)
    }

    /// Tell the user about a release found by a scheduled check.
    pub async fn announce_update(&mut self, info: &UpdateInfo) {
        let (true, Some(version)) = (info.has_update, info.latest_version.as_deref()) else {
            info!("No updates available");
            return;
        };
        info!("New version available: {}", version);

        if self.state.update_settings.auto_install {
            let pending = PendingUpdate {
                version: version.to_string(),
                download_url: info.release_url.clone().unwrap_or_default(),
                timestamp: chrono::Utc::now().timestamp_millis(),
            };
            match self.store.save_pending_update(&pending).await {
                Ok(()) => {
                    self.notifier.emit(ManagerEvent::update_ready(
                        version,
                        info.release_url.clone(),
                        self.language,
                    ));
                    return;
                }
                Err(err) => warn!(?err, "Auto-install failed; falling back to notification"),
            }
        }

        self.notifier.emit(ManagerEvent::update_available(
            version,
            info.release_url.clone(),
            self.language,
        ));
    }

    pub async fn persist(&mut self) -> SaveOutcome {
        let outcome = self.store.save(&mut self.state).await;
        match outcome {
            SaveOutcome::Saved => {}
            SaveOutcome::RestoredFromBackup => {
                warn!("State save failed; in-memory state restored from backup")
            }
            SaveOutcome::Failed => error!("State save failed and no backup was available"),
        }
        outcome
    }

    async fn reapply_if_enabled(&mut self) -> ManagerResult<()> {
        if !self.state.enabled {
            return Ok(());
        }
        let Some(profile) = self.state.active_server().cloned() else {
            return Ok(());
        };
        self.applier
            .apply(&profile, self.state.dns_enabled)
            .await
            .map_err(ManagerError::Host)
    }

    fn emit_status(&self) {
        self.notifier
            .emit(ManagerEvent::status(self.state.enabled, self.language));
    }
}
