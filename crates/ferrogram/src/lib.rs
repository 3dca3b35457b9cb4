//! # Ferrogram
//!
//! Receives Telegram bot updates, keeps a consistent cache of the chats,
//! users, members and messages they mention, and routes text commands to
//! handlers.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐
//! │ PollTransport │──┐
//! └───────────────┘  │   ┌──────────────────┐    ┌───────────────┐
//!                    ├──▶│ UpdateDispatcher │───▶│ CommandRouter │──▶ handlers
//! ┌───────────────┐  │   └────────┬─────────┘    └───────────────┘
//! │ PushTransport │──┘            │
//! └───────────────┘               ├──▶ EntityManagers (chats, users, members, messages)
//!                                 └──▶ EventBus ──▶ listeners
//! ```
//!
//! - **Transports** deliver raw envelopes, by long polling or webhook
//! - **UpdateDispatcher** turns an envelope into typed [`BotEvent`](prelude::BotEvent)s
//! - **EntityManagers** keep one shared handle per entity, patched in place
//! - **CommandRouter** strips the prefix, resolves aliases, runs middleware
//!   and then the handler
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ferrogram::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = FerrogramRuntime::builder().build()?;
//!
//!     runtime.commands().on("ping", |ctx: Arc<BotContext>, message: Handle<Message>, _args: Vec<String>| async move {
//!         ctx.reply(&message, "pong!").await.map(|_| ())
//!     })?;
//!
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` (default): TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output
//! - `tls`: HTTPS for the webhook receiver

pub use ferrogram_core as core;
pub use ferrogram_framework as framework;
pub use ferrogram_runtime as runtime;
pub use ferrogram_transport as transport;

/// Commonly used types.
///
/// ```rust,ignore
/// use ferrogram::prelude::*;
/// ```
pub mod prelude {
    pub use std::sync::Arc;

    // Runtime - main entry point
    pub use ferrogram_runtime::{BotContext, FerrogramConfig, FerrogramRuntime};

    // Entities and events
    pub use ferrogram_core::{
        BotEvent, CallbackQuery, Chat, ChatKind, CollectOptions, Collected, EndReason, EventBus,
        Handle, InlineQuery, Member, MemberStatus, Message, Store, User,
    };

    // Commands
    pub use ferrogram_framework::{CommandOptions, CommandRouter, TriggerOutcome};

    // Outbound calls
    pub use ferrogram_transport::BotApi;
}
