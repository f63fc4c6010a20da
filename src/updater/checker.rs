//! Release feed check with bounded exponential backoff.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

use super::version::{compare_versions, strip_v};
use crate::i18n::{self, Language, Message};
use crate::models::{ReleaseFeed, ReleaseInfo, UpdateInfo, UpdateSettings};
use crate::net::{HttpClient, HttpRequest};

const FEED_TIMEOUT: Duration = Duration::from_secs(30);

/// Why a single feed request did not yield a release.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedFailure {
    #[error("rate limited by the release feed")]
    RateLimited,
    #[error("repository or releases not found")]
    NotFound,
    #[error("release feed unavailable (HTTP {0})")]
    ServerUnavailable(u16),
    #[error("HTTP {0}")]
    HttpStatus(u16),
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid feed response: {0}")]
    InvalidResponse(String),
}

impl FeedFailure {
    /// Rate limiting and missing releases are terminal.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FeedFailure::RateLimited | FeedFailure::NotFound)
    }

    pub fn localized(&self, lang: Language) -> String {
        match self {
            FeedFailure::RateLimited => i18n::text(lang, Message::RateLimited).to_string(),
            FeedFailure::NotFound => i18n::text(lang, Message::ReleasesNotFound).to_string(),
            FeedFailure::ServerUnavailable(_) => {
                i18n::text(lang, Message::FeedServerUnavailable).to_string()
            }
            FeedFailure::HttpStatus(status) => format!("HTTP {status}"),
            FeedFailure::Network(_) => i18n::text(lang, Message::NoInternet).to_string(),
            FeedFailure::InvalidResponse(_) => {
                i18n::text(lang, Message::InvalidFeedResponse).to_string()
            }
        }
    }
}

/// Map a non-success status to its failure; `None` for 2xx.
pub fn classify_status(status: u16) -> Option<FeedFailure> {
    match status {
        200..=299 => None,
        403 => Some(FeedFailure::RateLimited),
        404 => Some(FeedFailure::NotFound),
        500..=u16::MAX => Some(FeedFailure::ServerUnavailable(status)),
        _ => Some(FeedFailure::HttpStatus(status)),
    }
}

/// Wait before retry number `retry` (1-based): `base * 2^(retry - 1)`.
pub fn retry_delay(base_ms: u64, retry: u32) -> Duration {
    let factor = 1u64.checked_shl(retry.saturating_sub(1)).unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor))
}

/// Result of a full check including retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCheckOutcome {
    pub result: Result<ReleaseInfo, FeedFailure>,
    /// Retries performed after the first attempt.
    pub retries: u32,
}

impl UpdateCheckOutcome {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self.result, Err(FeedFailure::RateLimited))
    }

    pub fn to_info(&self, current_version: &str, max_retries: u32, lang: Language) -> UpdateInfo {
        match &self.result {
            Ok(release) => UpdateInfo {
                has_update: compare_versions(current_version, &release.latest_version).is_lt(),
                current_version: current_version.to_string(),
                latest_version: Some(release.latest_version.clone()),
                release_url: release.release_url.clone(),
                release_notes: release.release_notes.clone(),
                published_at: release.published_at.clone(),
                ..UpdateInfo::default()
            },
            Err(failure) => {
                let mut message = failure.localized(lang);
                if self.retries > 0 {
                    message.push_str(&format!(
                        " ({}: {}/{})",
                        i18n::text(lang, Message::Attempts),
                        self.retries + 1,
                        max_retries + 1
                    ));
                }
                UpdateInfo {
                    has_update: false,
                    current_version: current_version.to_string(),
                    error: Some(message),
                    rate_limited: self.is_rate_limited(),
                    ..UpdateInfo::default()
                }
            }
        }
    }
}

#[derive(Clone)]
pub struct UpdateChecker {
    http: Arc<dyn HttpClient>,
    current_version: String,
}

impl UpdateChecker {
    pub fn new(http: Arc<dyn HttpClient>, current_version: impl Into<String>) -> Self {
        Self {
            http,
            current_version: current_version.into(),
        }
    }

    /// Query the feed, retrying retryable failures up to `max_retries` times.
    pub async fn check(&self, settings: &UpdateSettings) -> UpdateCheckOutcome {
        info!("Checking for updates at {}", settings.update_url);
        let attempts = settings.max_retries + 1;
        let mut retries = 0;

        loop {
            match self.fetch_once(&settings.update_url).await {
                Ok(release) => {
                    info!(
                        "Current version: {}, latest release: {}",
                        self.current_version, release.latest_version
                    );
                    return UpdateCheckOutcome {
                        result: Ok(release),
                        retries,
                    };
                }
                Err(failure) if failure.is_retryable() && retries < settings.max_retries => {
                    retries += 1;
                    let delay = retry_delay(settings.retry_delay, retries);
                    warn!(
                        "Update check failed (attempt {}/{}): {}, retrying in {:?}",
                        retries, attempts, failure, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(failure) => {
                    error!(
                        "Update check failed after {} attempt(s): {}",
                        retries + 1,
                        failure
                    );
                    return UpdateCheckOutcome {
                        result: Err(failure),
                        retries,
                    };
                }
            }
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<ReleaseInfo, FeedFailure> {
        let request = HttpRequest::get(url)
            .header("Accept", "application/vnd.github.v3+json")
            .header("User-Agent", format!("Proxy-Manager/{}", self.current_version))
            .timeout(FEED_TIMEOUT);

        let response = self
            .http
            .get(request)
            .await
            .map_err(|e| FeedFailure::Network(e.to_string()))?;
        if let Some(failure) = classify_status(response.status) {
            return Err(failure);
        }

        let feed: ReleaseFeed = response
            .json()
            .map_err(|e| FeedFailure::InvalidResponse(e.to_string()))?;
        let tag = feed
            .tag_name
            .filter(|tag| !tag.trim().is_empty())
            .ok_or_else(|| FeedFailure::InvalidResponse("missing tag_name".into()))?;

        Ok(ReleaseInfo {
            latest_version: strip_v(&tag).to_string(),
            release_url: feed.html_url,
            release_notes: feed.body,
            published_at: feed.published_at,
        })
    }
}
