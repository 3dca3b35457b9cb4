//! Configuration schema definitions.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use ferrogram_core::CacheSizes;
use ferrogram_transport::api::{DEFAULT_API_URL, DEFAULT_REQUEST_TIMEOUT};
use ferrogram_transport::{PollConfig, PushConfig, TlsConfig};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FerrogramConfig {
    pub bot: BotConfig,
    /// Entity cache capacities.
    pub cache: CacheSizes,
    pub commands: CommandsConfig,
    pub polling: PollConfig,
    pub webhook: WebhookConfig,
    pub logging: LoggingConfig,
}

// =============================================================================
// Bot
// =============================================================================

/// Bot API credentials and endpoint.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Bot token. Usually supplied through `FERROGRAM_BOT__TOKEN`.
    pub token: Option<String>,
    pub api_url: String,
    pub request_timeout_ms: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT.as_millis() as u64,
        }
    }
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("api_url", &self.api_url)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

/// Command router settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    pub prefix: String,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            prefix: ferrogram_framework::DEFAULT_PREFIX.to_string(),
        }
    }
}

// =============================================================================
// Webhook
// =============================================================================

/// Webhook receiver and registration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Receive updates through the webhook instead of polling.
    pub enabled: bool,
    /// Public URL registered with `setWebhook`. When absent the webhook is
    /// expected to be registered already.
    pub url: Option<String>,
    pub path: String,
    pub host: String,
    pub port: u16,
    pub secret_token: Option<String>,
    pub max_body_bytes: usize,
    pub tls: Option<TlsConfig>,
    /// Discard updates queued on the server when registering.
    pub drop_pending_updates: bool,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        let push = PushConfig::default();
        Self {
            enabled: false,
            url: None,
            path: push.path,
            host: push.host,
            port: push.port,
            secret_token: None,
            max_body_bytes: push.max_body_bytes,
            tls: None,
            drop_pending_updates: false,
        }
    }
}

impl WebhookConfig {
    /// The receiver part of this configuration.
    pub fn push_config(&self) -> PushConfig {
        PushConfig {
            path: self.path.clone(),
            host: self.host.clone(),
            port: self.port,
            secret_token: self.secret_token.clone(),
            max_body_bytes: self.max_body_bytes,
            tls: self.tls.clone(),
        }
    }
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line format. `json` requires the `json-log` feature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    Json,
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// How often the log file is rotated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanEventConfig {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

impl SpanEventConfig {
    pub const NONE: Self = Self {
        new: false,
        enter: false,
        exit: false,
        close: false,
    };

    /// Creation and close only; close carries the span's busy/idle time.
    pub const LIFECYCLE: Self = Self {
        new: true,
        enter: false,
        exit: false,
        close: true,
    };

    pub const FULL: Self = Self {
        new: true,
        enter: true,
        exit: true,
        close: true,
    };
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Log file, required when `output` is `file`.
    pub file_path: Option<PathBuf>,
    pub rotation: LogRotation,
    /// Rotated files to keep. `0` keeps all of them.
    pub max_files: usize,
    pub thread_ids: bool,
    /// Include source file and line.
    pub file_location: bool,
    /// Per-module levels, e.g. `ferrogram_transport = "debug"`.
    pub filters: BTreeMap<String, LogLevel>,
    pub span_events: SpanEventConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            file_path: None,
            rotation: LogRotation::Never,
            max_files: 5,
            thread_ids: false,
            file_location: false,
            filters: BTreeMap::new(),
            span_events: SpanEventConfig::default(),
        }
    }
}
