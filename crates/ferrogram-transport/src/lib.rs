//! # Ferrogram Transport
//!
//! The two ways updates reach a Ferrogram bot.
//!
//! ## Features
//!
//! - `http-client` (default): [`BotApi`], the reqwest-backed Bot API client
//! - `http-server` (default): [`PushTransport`], the axum webhook receiver
//! - `tls`: HTTPS for the webhook receiver, via `axum-server`
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐     ┌──────────────────────┐
//! │  PollTransport       │     │  PushTransport       │
//! │  (UpdateSource loop) │     │  (POST <path>)       │
//! └──────────┬───────────┘     └──────────┬───────────┘
//!            │        Envelope            │
//!            └────────────┬───────────────┘
//!                         ▼
//!              ┌──────────────────────┐
//!              │  UpdateSink          │  (ferrogram-core)
//!              └──────────────────────┘
//! ```
//!
//! The transports only deliver envelopes. They know nothing of entities,
//! events or commands; any [`UpdateSink`](ferrogram_core::UpdateSink) can
//! receive them.
//!
//! Polling and webhooks are mutually exclusive on the platform side. The
//! poll loop resolves a conflict by removing the webhook and retrying.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ferrogram_transport::{BotApi, PollConfig, PollTransport};
//!
//! let api = Arc::new(BotApi::new(DEFAULT_API_URL, token)?);
//! let poller = Arc::new(PollTransport::new(api, dispatcher, PollConfig::default()));
//! poller.start();
//! ```

pub mod error;
pub mod poll;
pub mod source;

#[cfg(feature = "http-client")]
pub mod api;

#[cfg(feature = "http-server")]
pub mod push;

pub use error::{
    ErrorClass, PollError, PollResult, PushError, PushResult, TransportError, TransportResult,
};
pub use poll::{PollConfig, PollState, PollTransport};
pub use source::{UpdateSource, UpdatesRequest};

#[cfg(feature = "http-client")]
pub use api::{BotApi, DEFAULT_API_URL, WebhookInfo, WebhookOptions};

#[cfg(feature = "http-server")]
pub use push::{PushConfig, PushTransport, TlsConfig};
