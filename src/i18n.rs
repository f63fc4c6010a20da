//! User-facing strings in English and Russian.
//!
//! Russian is the reference table: a language code we do not know resolves to it.

use flutter_rust_bridge::frb;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[frb]
pub enum Language {
    #[default]
    En,
    Ru,
}

impl Language {
    /// Resolve a two-letter code; anything unrecognised falls back to Russian.
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "en" => Language::En,
            _ => Language::Ru,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ru => "ru",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    AppTitle,
    StatusEnabled,
    StatusDisabled,
    ServerNotFound,
    NoServersAvailable,
    PermissionMissing,
    ProxyError,
    InvalidCredentials,
    NoActiveServer,
    ProxyReapplied,
    FillAllFields,
    PortRange,
    RateLimited,
    ReleasesNotFound,
    FeedServerUnavailable,
    InvalidFeedResponse,
    NoInternet,
    Attempts,
    UpdateAvailable,
    UpdateReady,
    DownloadUpdate,
    RemindLater,
    InstallNow,
    InstallLater,
    TrafficThroughProxy,
    ProxyBypassed,
    ProxyIpReceived,
    ServerUnavailable,
    ConnectionTimeout,
    ApplyTestFailed,
    ProxyNotResponding,
}

/// Look up a message. Placeholders such as `{version}` are left for the caller.
pub fn text(lang: Language, message: Message) -> &'static str {
    match lang {
        Language::En => en(message),
        Language::Ru => ru(message),
    }
}

/// Look up a message and substitute `{name}` placeholders.
pub fn format(lang: Language, message: Message, args: &[(&str, &str)]) -> String {
    let mut out = text(lang, message).to_string();
    for (name, value) in args {
        out = out.replace(&format!("{{{name}}}"), value);
    }
    out
}

fn en(message: Message) -> &'static str {
    match message {
        Message::AppTitle => "Proxy Manager",
        Message::StatusEnabled => "Enabled",
        Message::StatusDisabled => "Disabled",
        Message::ServerNotFound => "Server not found",
        Message::NoServersAvailable => "No servers available to connect",
        Message::PermissionMissing => {
            "The \"proxy\" permission is missing. Reinstall the extension."
        }
        Message::ProxyError => "Proxy switching error",
        Message::InvalidCredentials => {
            "Username and password must not contain spaces or the characters \" \\ ; @"
        }
        Message::NoActiveServer => "No active server or proxy is disabled",
        Message::ProxyReapplied => "Proxy settings reapplied",
        Message::FillAllFields => "Please fill in all required fields",
        Message::PortRange => "Port must be between 1 and 65535",
        Message::RateLimited => "GitHub API rate limit exceeded. Try again later.",
        Message::ReleasesNotFound => "Repository or releases not found.",
        Message::FeedServerUnavailable => "GitHub server is temporarily unavailable.",
        Message::InvalidFeedResponse => "Invalid response from GitHub API",
        Message::NoInternet => "No internet connection or GitHub is unreachable.",
        Message::Attempts => "Attempts",
        Message::UpdateAvailable => "New version {version} is available!",
        Message::UpdateReady => "Update {version} is ready to install!",
        Message::DownloadUpdate => "Download update",
        Message::RemindLater => "Remind me later",
        Message::InstallNow => "Install now",
        Message::InstallLater => "Install later",
        Message::TrafficThroughProxy => {
            "Traffic goes through proxy. IP changed from {original} to {proxy}"
        }
        Message::ProxyBypassed => {
            "Warning: IP did not change ({proxy}). Traffic may not go through proxy"
        }
        Message::ProxyIpReceived => "IP received through proxy: {proxy}",
        Message::ServerUnavailable => "Proxy server is unavailable or not responding",
        Message::ConnectionTimeout => "Connection timeout",
        Message::ApplyTestFailed => "Failed to apply test proxy settings",
        Message::ProxyNotResponding => "Proxy server not responding",
    }
}

fn ru(message: Message) -> &'static str {
    match message {
        Message::AppTitle => "Proxy Manager",
        Message::StatusEnabled => "Включен",
        Message::StatusDisabled => "Отключен",
        Message::ServerNotFound => "Сервер не найден",
        Message::NoServersAvailable => "Нет доступных серверов для подключения",
        Message::PermissionMissing => {
            "Отсутствует разрешение \"proxy\". Переустановите расширение."
        }
        Message::ProxyError => "Ошибка переключения прокси",
        Message::InvalidCredentials => {
            "Логин и пароль не должны содержать пробелы и символы \" \\ ; @"
        }
        Message::NoActiveServer => "Нет активного сервера или прокси отключен",
        Message::ProxyReapplied => "Настройки прокси переприменены",
        Message::FillAllFields => "Пожалуйста, заполните все обязательные поля",
        Message::PortRange => "Порт должен быть от 1 до 65535",
        Message::RateLimited => "Превышен лимит запросов к GitHub API. Попробуйте позже.",
        Message::ReleasesNotFound => "Репозиторий или релизы не найдены.",
        Message::FeedServerUnavailable => "Сервер GitHub временно недоступен.",
        Message::InvalidFeedResponse => "Некорректный ответ от GitHub API",
        Message::NoInternet => "Нет подключения к интернету или GitHub недоступен.",
        Message::Attempts => "Попыток",
        Message::UpdateAvailable => "Доступна новая версия {version}!",
        Message::UpdateReady => "Обновление {version} готово к установке!",
        Message::DownloadUpdate => "Скачать обновление",
        Message::RemindLater => "Напомнить позже",
        Message::InstallNow => "Установить сейчас",
        Message::InstallLater => "Установить позже",
        Message::TrafficThroughProxy => {
            "Трафик идет через прокси. IP изменился с {original} на {proxy}"
        }
        Message::ProxyBypassed => {
            "Внимание: IP не изменился ({proxy}). Возможно, трафик не идет через прокси"
        }
        Message::ProxyIpReceived => "Получен IP через прокси: {proxy}",
        Message::ServerUnavailable => "Прокси сервер недоступен или не отвечает",
        Message::ConnectionTimeout => "Превышено время ожидания",
        Message::ApplyTestFailed => "Не удалось применить тестовые настройки прокси",
        Message::ProxyNotResponding => "Прокси сервер не отвечает",
    }
}
