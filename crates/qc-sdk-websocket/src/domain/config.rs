//! Notification client configuration with validation.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use super::error::ConfigError;

/// Default inbound frame queue bound.
pub const DEFAULT_ROUTER_CAPACITY: usize = 1024;

/// Default per-subscriber delivery bound on the pool path.
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Notification client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Websocket endpoint of the node (`ws://` or `wss://`)
    pub url: String,
    /// Maximum pending inbound frames
    pub router_capacity: usize,
    /// How long `route_message` waits for queue space before dropping the frame
    #[serde(with = "humantime_serde")]
    pub route_timeout: Duration,
    /// Per-subscriber delivery bound on the pool path; slower subscribers are dropped
    #[serde(with = "humantime_serde")]
    pub delivery_timeout: Duration,
    /// Per-subscriber buffer on the pool path
    pub stream_capacity: usize,
    /// Wait for the server's uid frame after connecting
    #[serde(with = "humantime_serde")]
    pub handshake_timeout: Duration,
    /// Deadline for in-flight dispatch when the router is closed
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
    /// Error-reporting channel bound
    pub error_capacity: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:3000/ws".to_string(),
            router_capacity: DEFAULT_ROUTER_CAPACITY,
            route_timeout: Duration::from_secs(5),
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
            stream_capacity: 64,
            handshake_timeout: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(5),
            error_capacity: 256,
        }
    }
}

impl NotificationConfig {
    /// Defaults, with `url` taken from `QC_WS_URL` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = env::var("QC_WS_URL") {
            config.url = url;
        }
        config
    }

    /// Same configuration pointed at another endpoint.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(ConfigError::InvalidUrl(self.url.clone()));
        }

        for (name, value) in [
            ("router_capacity", self.router_capacity),
            ("stream_capacity", self.stream_capacity),
            ("error_capacity", self.error_capacity),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidCapacity(format!("{name} cannot be 0")));
            }
        }

        for (name, value) in [
            ("route_timeout", self.route_timeout),
            ("delivery_timeout", self.delivery_timeout),
            ("handshake_timeout", self.handshake_timeout),
            ("shutdown_timeout", self.shutdown_timeout),
        ] {
            if value.is_zero() {
                return Err(ConfigError::InvalidTimeout(format!("{name} cannot be 0")));
            }
        }

        Ok(())
    }
}

/// Duration serde as `"30s"`, `"500ms"` or `"2m"`.
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, &'static str> {
        let s = s.trim();
        // "ms" before "s": both end in 's'
        if let Some(ms) = s.strip_suffix("ms") {
            ms.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| "invalid milliseconds")
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid seconds")
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.trim()
                .parse::<u64>()
                .ok()
                .and_then(|m| m.checked_mul(60))
                .map(Duration::from_secs)
                .ok_or("invalid minutes")
        } else {
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid duration format")
        }
    }
}
