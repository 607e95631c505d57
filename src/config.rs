//! Layered configuration for the push channels.
//!
//! Priority (highest to lowest):
//! 1. Environment variables prefixed with `PUSH__`, `__` separating nested keys
//!    (e.g. `PUSH__ALERTS__MAX_RETRIES=5`)
//! 2. Optional TOML file
//! 3. Built-in defaults

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::core::{
    ChannelEndpoint, ChannelKind, ChannelProfile, ExponentialBackoff, MAX_ACTIVE_TOASTS,
    MAX_MESSAGES_BUFFER, TextHeartbeat, ToastPolicy, WebSocketBufferConfig, WebSocketError,
    WebSocketResult,
};

const ENV_PREFIX: &str = "PUSH";
const ENV_SEPARATOR: &str = "__";

/// Per-channel endpoint, reconnect and heartbeat settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Path (and query) appended to `base_url`; `{subject}` is replaced by the subject id.
    pub path: String,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_ms: u64,
    /// Absent means retry forever.
    pub max_retries: Option<u32>,
    /// 0 disables the heartbeat.
    pub heartbeat_interval_ms: u64,
    pub heartbeat_payload: String,
}

impl ChannelConfig {
    pub fn alerts() -> Self {
        Self {
            path: "/api/v1/ws/notification/{subject}".to_string(),
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            jitter_ms: 500,
            max_retries: Some(10),
            heartbeat_interval_ms: 25_000,
            heartbeat_payload: "ping".to_string(),
        }
    }

    pub fn unread() -> Self {
        Self {
            path: "/ws/notify?u={subject}".to_string(),
            base_delay_ms: 500,
            max_delay_ms: 20_000,
            jitter_ms: 250,
            max_retries: None,
            heartbeat_interval_ms: 0,
            heartbeat_payload: "ping".to_string(),
        }
    }

    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_delay_ms),
        )
        .with_jitter(Duration::from_millis(self.jitter_ms))
        .with_max_retries(self.max_retries)
    }

    pub fn heartbeat(&self) -> Option<TextHeartbeat> {
        (self.heartbeat_interval_ms > 0).then(|| {
            TextHeartbeat::new(
                Duration::from_millis(self.heartbeat_interval_ms),
                self.heartbeat_payload.clone(),
            )
        })
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::alerts()
    }
}

/// Toast rate limiting for the alerts channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToastConfig {
    pub min_gap_ms: u64,
    pub max_active: usize,
    /// Assumed auto-dismiss lifetime; 0 means tickets live until closed or evicted.
    pub ttl_ms: u64,
}

impl Default for ToastConfig {
    fn default() -> Self {
        Self {
            min_gap_ms: 2_000,
            max_active: MAX_ACTIVE_TOASTS,
            ttl_ms: 5_000,
        }
    }
}

impl ToastConfig {
    pub fn policy(&self) -> ToastPolicy {
        ToastPolicy {
            min_gap: Duration::from_millis(self.min_gap_ms),
            max_active: self.max_active,
            ttl: (self.ttl_ms > 0).then(|| Duration::from_millis(self.ttl_ms)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    /// Scheme and host of both endpoints, e.g. `wss://crm.example.com`.
    pub base_url: String,
    /// Cap on retained alerts.
    pub max_messages: usize,
    pub max_message_bytes: usize,
    pub alerts: ChannelConfig,
    pub unread: ChannelConfig,
    pub toast: ToastConfig,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            base_url: "ws://localhost:8000".to_string(),
            max_messages: MAX_MESSAGES_BUFFER,
            max_message_bytes: WebSocketBufferConfig::default().max_message_bytes,
            alerts: ChannelConfig::alerts(),
            unread: ChannelConfig::unread(),
            toast: ToastConfig::default(),
        }
    }
}

impl PushConfig {
    /// Defaults, then `path` if given and present, then the process environment.
    pub fn load(path: Option<&Path>) -> WebSocketResult<Self> {
        Self::load_from_sources(path, None)
    }

    /// Like [`PushConfig::load`], reading variables from `env` instead of the process
    /// environment when provided.
    pub fn load_from_sources(
        path: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> WebSocketResult<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&PushConfig::default())?);
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }
        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true)
                    .source(env),
            )
            .build()?;

        let loaded: PushConfig = config.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject endpoint templates that cannot produce a websocket URL.
    pub fn validate(&self) -> WebSocketResult<()> {
        for kind in [ChannelKind::Alerts, ChannelKind::Unread] {
            let endpoint = self.endpoint(kind);
            if !self.channel(kind).path.contains(crate::core::SUBJECT_PLACEHOLDER) {
                return Err(WebSocketError::InvalidUrl(format!(
                    "{} path has no {} placeholder",
                    kind.as_str(),
                    crate::core::SUBJECT_PLACEHOLDER
                )));
            }
            endpoint.resolve("validate")?;
        }
        Ok(())
    }

    pub fn channel(&self, kind: ChannelKind) -> &ChannelConfig {
        match kind {
            ChannelKind::Alerts => &self.alerts,
            ChannelKind::Unread => &self.unread,
        }
    }

    pub fn endpoint(&self, kind: ChannelKind) -> ChannelEndpoint {
        ChannelEndpoint::new(self.base_url.clone(), self.channel(kind).path.clone())
    }

    pub fn profile(&self, kind: ChannelKind) -> ChannelProfile {
        ChannelProfile {
            kind,
            endpoint: self.endpoint(kind),
            heartbeat: self.channel(kind).heartbeat(),
        }
    }

    pub fn buffers(&self) -> WebSocketBufferConfig {
        WebSocketBufferConfig {
            max_message_bytes: self.max_message_bytes,
            max_frame_bytes: self.max_message_bytes,
            ..WebSocketBufferConfig::default()
        }
    }
}
