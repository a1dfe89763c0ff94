//! Configuration loader and application settings.

use crate::errors::{AppError, Result};
use crate::models::{ExchangeSegment, FeedVersion};
use std::time::Duration;

pub const DEFAULT_SECURITY_ID: &str = "1333";
pub const DEFAULT_SEND_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_INSTRUMENT_NAME: &str = "HDFC BANK";
pub const DEFAULT_FEED_URL: &str = "wss://api-feed.dhan.co";
pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Consolidated application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Dhan client id.
    pub client_id: String,
    /// Dhan access token.
    pub access_token: String,
    pub telegram_bot_token: String,
    pub telegram_chat_id: String,
    /// Security id of the single subscribed instrument.
    pub security_id: String,
    pub segment: ExchangeSegment,
    /// Display name used in alerts for `security_id`.
    pub instrument_name: String,
    /// Minimum time between two sent alerts.
    pub send_interval: Duration,
    pub feed_url: String,
    /// Handshake shapes, tried in order until one connects.
    pub feed_versions: Vec<FeedVersion>,
    pub telegram_api_url: String,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| AppError::Config(format!("Set {key} env var")))
        };
        let optional = |key: &str, default: &str| -> String {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let client_id = required("DHAN_CLIENT_ID")?;
        let access_token = required("DHAN_ACCESS_TOKEN")?;
        let telegram_bot_token = required("TELEGRAM_BOT_TOKEN")?;
        let telegram_chat_id = required("TELEGRAM_CHAT_ID")?;

        let send_interval_secs: u64 = optional(
            "SEND_INTERVAL_SECONDS",
            &DEFAULT_SEND_INTERVAL_SECS.to_string(),
        )
        .parse()
        .map_err(|e| {
            AppError::Config(format!("SEND_INTERVAL_SECONDS must be whole seconds: {e}"))
        })?;

        let segment = optional("EXCHANGE_SEGMENT", "NSE_EQ")
            .parse()
            .map_err(|e| AppError::Config(format!("EXCHANGE_SEGMENT: {e}")))?;

        let feed_versions = optional("DHAN_FEED_VERSIONS", "2")
            .split(',')
            .filter(|v| !v.trim().is_empty())
            .map(|v| v.parse::<FeedVersion>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Config(format!("DHAN_FEED_VERSIONS: {e}")))?;
        if feed_versions.is_empty() {
            return Err(AppError::Config(
                "DHAN_FEED_VERSIONS must name at least one version".into(),
            ));
        }

        Ok(Self {
            client_id,
            access_token,
            telegram_bot_token,
            telegram_chat_id,
            security_id: optional("HDFC_ID", DEFAULT_SECURITY_ID),
            segment,
            instrument_name: optional("INSTRUMENT_NAME", DEFAULT_INSTRUMENT_NAME),
            send_interval: Duration::from_secs(send_interval_secs),
            feed_url: optional("DHAN_FEED_URL", DEFAULT_FEED_URL),
            feed_versions,
            telegram_api_url: optional("TELEGRAM_API_URL", DEFAULT_TELEGRAM_API_URL),
        })
    }
}
