//! Outbound events: status indicator changes and user notifications.

use flutter_rust_bridge::frb;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::i18n::{self, Language, Message};

pub const ICON_ENABLED: &str = "icons/icon32.png";
pub const ICON_DISABLED: &str = "icons/icon32-disabled.png";
pub const UPDATE_AVAILABLE_ID: &str = "update-available";
pub const UPDATE_READY_ID: &str = "update-ready";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[frb]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
    pub buttons: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
#[frb]
pub enum ManagerEvent {
    StatusChanged {
        enabled: bool,
        title: String,
        icon: String,
    },
    Notification(Notification),
}

impl ManagerEvent {
    pub fn status(enabled: bool, lang: Language) -> Self {
        let state = if enabled {
            Message::StatusEnabled
        } else {
            Message::StatusDisabled
        };
        ManagerEvent::StatusChanged {
            enabled,
            title: format!(
                "{} - {}",
                i18n::text(lang, Message::AppTitle),
                i18n::text(lang, state)
            ),
            icon: if enabled { ICON_ENABLED } else { ICON_DISABLED }.to_string(),
        }
    }

    pub fn update_available(version: &str, release_url: Option<String>, lang: Language) -> Self {
        ManagerEvent::Notification(Notification {
            id: UPDATE_AVAILABLE_ID.to_string(),
            title: i18n::text(lang, Message::AppTitle).to_string(),
            message: i18n::format(lang, Message::UpdateAvailable, &[("version", version)]),
            buttons: vec![
                i18n::text(lang, Message::DownloadUpdate).to_string(),
                i18n::text(lang, Message::RemindLater).to_string(),
            ],
            url: release_url,
        })
    }

    pub fn update_ready(version: &str, release_url: Option<String>, lang: Language) -> Self {
        ManagerEvent::Notification(Notification {
            id: UPDATE_READY_ID.to_string(),
            title: i18n::text(lang, Message::AppTitle).to_string(),
            message: i18n::format(lang, Message::UpdateReady, &[("version", version)]),
            buttons: vec![
                i18n::text(lang, Message::InstallNow).to_string(),
                i18n::text(lang, Message::InstallLater).to_string(),
            ],
            url: release_url,
        })
    }
}

/// Fire-and-forget event sink.
pub trait Notifier: Send + Sync {
    fn emit(&self, event: ManagerEvent);
}

#[derive(Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<ManagerEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ManagerEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}

impl Notifier for BroadcastNotifier {
    fn emit(&self, event: ManagerEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("No event subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_event_uses_localized_title() {
        let event = ManagerEvent::status(true, Language::Ru);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "statusChanged");
        assert_eq!(value["title"], "Proxy Manager - Включен");
        assert_eq!(value["icon"], ICON_ENABLED);
    }

    #[test]
    fn update_notification_carries_version_and_buttons() {
        let event = ManagerEvent::update_available("1.2.0", Some("https://x".into()), Language::En);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "notification");
        assert_eq!(value["id"], UPDATE_AVAILABLE_ID);
        assert_eq!(value["message"], "New version 1.2.0 is available!");
        assert_eq!(value["buttons"][0], "Download update");
        assert_eq!(value["url"], "https://x");
    }

    #[tokio::test]
    async fn broadcast_reaches_subscribers_and_tolerates_none() {
        let notifier = BroadcastNotifier::default();
        notifier.emit(ManagerEvent::status(false, Language::En));

        let mut rx = notifier.subscribe();
        notifier.emit(ManagerEvent::status(true, Language::En));
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, ManagerEvent::StatusChanged { enabled: true, .. }));
    }
}
